//! Notification records, rendering and delivery.

mod channel;
mod service;

pub use channel::{DeliveryChannel, DeliveryError, EmailMessage, InMemoryChannel, LogChannel};
pub use service::{DEFAULT_INVENTORY_MANAGER_EMAIL, NotificationService, render};

use serde::{Deserialize, Serialize};
use store::{NotificationStatus, OrderId, OrderStatus};

/// Type tag of stock alerts.
pub const LOW_STOCK: &str = "low_stock";

/// Type tag of order status changes.
pub const ORDER_STATUS: &str = "order_status";

/// Request body for creating a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// Payload of an `order_status` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusNotice {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub recipient: String,
}

/// Query parameters for listing notifications.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct NotificationFilter {
    pub status: Option<NotificationStatus>,
}
