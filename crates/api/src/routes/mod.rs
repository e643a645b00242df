pub mod gateway;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod notifications;
pub mod orders;
pub mod products;
