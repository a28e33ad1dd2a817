pub mod connection;
pub mod error;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
pub use repositories::{
    chat::ChatRepository,
    organizations::OrganizationRepository,
    subscriptions::SubscriptionRepository,
    wallets::{ChargeOutcome, WalletRepository},
};
