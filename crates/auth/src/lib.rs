pub mod billing_service;
pub mod config;
pub mod error;
pub mod identity_service;
pub mod jwt;

pub use billing_service::BillingService;
pub use config::BillingConfig;
pub use error::{AuthError, Result};
pub use identity_service::{Identity, IdentityService};
pub use jwt::{Claims, JwtService};
