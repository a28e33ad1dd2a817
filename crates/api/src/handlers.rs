pub mod billing;
pub mod chat;
pub mod error;
pub mod health;
pub mod me;
pub mod metrics;

