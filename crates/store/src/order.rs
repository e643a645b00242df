//! Orders and their lines.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderLineId, OrderStatus, Pagination, ProductId, Result};

/// A persisted order together with its lines, in line creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderLineRecord>,
}

/// A persisted order line. `unit_price` is the product price at the time
/// the order was created, not a live reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: f64,
    pub unit_price: f64,
}

/// Fields for inserting an order. New orders always start `pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
}

/// Fields for inserting one order line.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: f64,
    pub unit_price: f64,
}

/// Storage for orders and order lines.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a `pending` order with no lines.
    async fn insert_order(&self, order: NewOrder) -> Result<OrderRecord>;

    /// Appends lines to an existing order, preserving the given order.
    async fn insert_order_lines(
        &self,
        order_id: OrderId,
        lines: Vec<NewOrderLine>,
    ) -> Result<Vec<OrderLineRecord>>;

    /// Deletes an order and, by cascade, its lines. Returns false if the
    /// order didn't exist.
    async fn delete_order(&self, order_id: OrderId) -> Result<bool>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Lists orders in id order.
    async fn list_orders(&self, page: Pagination) -> Result<Vec<OrderRecord>>;

    async fn list_orders_by_email(&self, email: &str) -> Result<Vec<OrderRecord>>;

    /// Overwrites the status unconditionally and refreshes `updated_at`.
    ///
    /// Returns None if the order doesn't exist.
    async fn set_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<OrderRecord>>;

    /// Moves the order from `from` to `to` only if it is currently in
    /// `from`. Returns false (and writes nothing) otherwise.
    async fn transition_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool>;
}
