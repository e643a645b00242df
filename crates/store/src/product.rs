//! Product catalog table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Pagination, ProductId, Result};

/// A persisted product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub sku: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a product. Validation happens before this point.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub sku: String,
}

/// A partial product update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub sku: Option<String>,
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.sku.is_none()
    }

    pub(crate) fn apply_to(self, product: &mut ProductRecord) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(sku) = self.sku {
            product.sku = sku;
        }
    }
}

/// Storage for the product catalog.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a product. Fails with `Conflict` if the SKU is taken.
    async fn insert_product(&self, product: NewProduct) -> Result<ProductRecord>;

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>>;

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>>;

    /// Lists products in id order.
    async fn list_products(&self, page: Pagination) -> Result<Vec<ProductRecord>>;

    /// Applies a partial update and refreshes `updated_at`.
    ///
    /// Returns None if the product doesn't exist.
    async fn update_product(
        &self,
        id: ProductId,
        changes: ProductChanges,
    ) -> Result<Option<ProductRecord>>;

    /// Deletes a product. Returns false if it didn't exist.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;
}
