pub mod chat;
pub mod organizations;
pub mod subscriptions;
pub mod wallets;
