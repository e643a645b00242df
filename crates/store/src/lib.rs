//! Relational storage for the inventory microservices.
//!
//! Each service owns one family of tables and talks to it through a trait
//! (`ProductStore`, `InventoryStore`, `OrderStore`, `NotificationStore`).
//! Two backends implement every trait: [`InMemoryStore`] for tests and local
//! runs, and [`PostgresStore`] for deployments.

pub mod error;
pub mod inventory;
pub mod memory;
pub mod notification;
pub mod order;
pub mod postgres;
pub mod product;

pub use common::{
    InventoryItemId, NotificationId, NotificationStatus, OrderId, OrderLineId, OrderStatus,
    Pagination, ProductId,
};
pub use error::{Result, StoreError};
pub use inventory::{AdjustOutcome, InventoryChanges, InventoryRecord, InventoryStore, NewInventoryItem};
pub use memory::InMemoryStore;
pub use notification::{NewNotification, NotificationRecord, NotificationStore};
pub use order::{NewOrder, NewOrderLine, OrderLineRecord, OrderRecord, OrderStore};
pub use postgres::PostgresStore;
pub use product::{NewProduct, ProductChanges, ProductRecord, ProductStore};
