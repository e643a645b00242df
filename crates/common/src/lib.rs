//! Shared types used across every service crate.

pub mod status;
pub mod types;

pub use status::{NotificationStatus, OrderStatus, UnknownStatus};
pub use types::{
    DEFAULT_PAGE_LIMIT, InventoryItemId, NotificationId, OrderId, OrderLineId, Pagination,
    ProductId,
};
