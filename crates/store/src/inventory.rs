//! Per-product stock levels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InventoryItemId, Pagination, ProductId, Result};

/// A persisted inventory row. There is at most one row per product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryItemId,
    pub product_id: ProductId,
    pub quantity: f64,
    pub location: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating (or overwriting) the stock row of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventoryItem {
    pub product_id: ProductId,
    pub quantity: f64,
    pub location: Option<String>,
}

/// A partial inventory update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryChanges {
    pub quantity: Option<f64>,
    pub location: Option<String>,
}

/// Result of applying a signed delta to a stock row.
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustOutcome {
    /// The delta was applied.
    Applied(InventoryRecord),
    /// The delta would take the quantity below zero and negatives were not
    /// allowed. Nothing was written.
    WouldGoNegative { current: f64 },
    /// No stock row exists for the product.
    Missing,
}

/// Storage for inventory rows, keyed by product.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Creates the row for `item.product_id`, or overwrites quantity and
    /// location if one already exists.
    async fn upsert_inventory(&self, item: NewInventoryItem) -> Result<InventoryRecord>;

    async fn get_inventory(&self, product_id: ProductId) -> Result<Option<InventoryRecord>>;

    /// Lists inventory rows in id order.
    async fn list_inventory(&self, page: Pagination) -> Result<Vec<InventoryRecord>>;

    /// Applies a partial update. Returns None if no row exists.
    async fn update_inventory(
        &self,
        product_id: ProductId,
        changes: InventoryChanges,
    ) -> Result<Option<InventoryRecord>>;

    /// Atomically adds `amount` (which may be negative) to the quantity.
    async fn adjust_inventory(
        &self,
        product_id: ProductId,
        amount: f64,
        allow_negative: bool,
    ) -> Result<AdjustOutcome>;
}
