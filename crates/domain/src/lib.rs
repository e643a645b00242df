//! Domain layer for the inventory microservices.
//!
//! This crate provides:
//! - Value objects that validate request input
//! - Request bodies for each service, with `validate` conversions into
//!   storage inserts
//! - One service per table family (`ProductService`, `InventoryService`,
//!   `OrderService`, `NotificationService`)
//! - Notification rendering and delivery channels

pub mod error;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod product;
pub mod validation;

pub use error::{DomainError, Result};
pub use inventory::{
    AdjustInventory, CreateInventoryItem, DEFAULT_STOCK_THRESHOLD, InventoryService,
    LowStockAlert, UpdateInventoryItem,
};
pub use notification::{
    CreateNotification, DEFAULT_INVENTORY_MANAGER_EMAIL, DeliveryChannel, DeliveryError,
    EmailMessage, InMemoryChannel, LOW_STOCK, LogChannel, NotificationFilter,
    NotificationService, ORDER_STATUS, OrderStatusNotice,
};
pub use order::{
    CreateOrder, OrderLineRequest, OrderService, RequestedLine, UpdateOrderStatus,
    ValidatedOrder,
};
pub use product::{CreateProduct, ProductService, UpdateProduct};
pub use validation::ValidationError;
