pub mod auth;
pub mod body_limit;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use auth::{require_admin, require_auth, AuthUser};
pub use metrics::{record_metrics, MetricsRecorder};
pub use rate_limit::{rate_limit_user, RateLimiter};
pub use request_id::CorrelationId;
