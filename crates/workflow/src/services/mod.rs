//! Collaborator traits with in-memory and HTTP implementations.
//!
//! The in-memory versions record every call and can be told to fail, for
//! tests. The HTTP versions talk to the sibling services.

pub mod inventory;
pub mod notification;
pub mod product;

use std::time::Duration;

pub use inventory::{HttpInventoryClient, InMemoryInventoryClient, InventoryClient};
pub use notification::{HttpNotifier, InMemoryNotifier, Notifier};
pub use product::{HttpProductLookup, InMemoryProductLookup, ProductInfo, ProductLookup};

/// Builds the HTTP client shared by the collaborator clients. Every request
/// made through it is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
