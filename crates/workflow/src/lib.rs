//! Cross-service coordination for order fulfillment.
//!
//! The order service owns orders but depends on three collaborators it
//! reaches over HTTP: products (price snapshots), inventory (stock checks
//! and decrements) and notifications. This crate provides:
//! - Collaborator traits with in-memory and HTTP implementations
//! - [`OrderWorkflow`], which creates orders and runs the fulfillment
//!   procedure
//! - [`FulfillmentQueue`], an inspectable job queue that runs fulfillment
//!   off the request path
//! - [`OrderLocks`], which serializes fulfillment with status updates
//! - [`StockKeeper`], the inventory service's product checks and
//!   low-stock alerts

pub mod coordinator;
pub mod error;
pub mod locks;
pub mod queue;
pub mod services;
pub mod state;
pub mod stock;

pub use coordinator::{Fulfill, OrderWorkflow};
pub use error::{Result, WorkflowError};
pub use locks::OrderLocks;
pub use queue::{FulfillmentQueue, JOB_RETENTION};
pub use services::{
    HttpInventoryClient, HttpNotifier, HttpProductLookup, InMemoryInventoryClient,
    InMemoryNotifier, InMemoryProductLookup, InventoryClient, Notifier, ProductInfo,
    ProductLookup, http_client,
};
pub use state::{FailureReason, FulfillmentOutcome, Job, JobState, PartialFailurePolicy};
pub use stock::StockKeeper;
