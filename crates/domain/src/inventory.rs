//! Stock levels per product.

use serde::{Deserialize, Serialize};
use store::{
    AdjustOutcome, InventoryChanges, InventoryRecord, InventoryStore, NewInventoryItem,
    Pagination, ProductId,
};

use crate::error::{DomainError, Result};
use crate::validation::{self, ValidationError};

/// Stock level at or below which a low-stock alert is raised.
pub const DEFAULT_STOCK_THRESHOLD: f64 = 10.0;

/// Request body for creating (or overwriting) a product's stock row.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInventoryItem {
    pub product_id: ProductId,
    pub quantity: f64,
    #[serde(default)]
    pub location: Option<String>,
}

impl CreateInventoryItem {
    pub fn validate(self) -> std::result::Result<NewInventoryItem, ValidationError> {
        Ok(NewInventoryItem {
            product_id: validation::product_ref(self.product_id)?,
            quantity: validation::stock_level(self.quantity)?,
            location: self.location.map(validation::location).transpose()?,
        })
    }
}

/// Request body for a partial stock update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInventoryItem {
    pub quantity: Option<f64>,
    pub location: Option<String>,
}

impl UpdateInventoryItem {
    pub fn validate(self) -> std::result::Result<InventoryChanges, ValidationError> {
        Ok(InventoryChanges {
            quantity: self.quantity.map(validation::stock_level).transpose()?,
            location: self.location.map(validation::location).transpose()?,
        })
    }
}

/// Request body for a signed stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustInventory {
    pub amount: f64,
    #[serde(default)]
    pub allow_negative: bool,
}

/// Payload of a `low_stock` notification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub current_quantity: f64,
    pub threshold: f64,
}

/// Service for managing stock rows.
///
/// Product existence is not checked here; callers that own a product
/// lookup verify it before create and update.
pub struct InventoryService<S: InventoryStore> {
    store: S,
    threshold: f64,
}

impl<S: InventoryStore> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self::with_threshold(store, DEFAULT_STOCK_THRESHOLD)
    }

    pub fn with_threshold(store: S, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the alert to raise for `item`, if its quantity is at or
    /// below the threshold.
    pub fn low_stock(&self, item: &InventoryRecord) -> Option<LowStockAlert> {
        (item.quantity <= self.threshold).then_some(LowStockAlert {
            product_id: item.product_id,
            current_quantity: item.quantity,
            threshold: self.threshold,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn upsert(&self, item: NewInventoryItem) -> Result<InventoryRecord> {
        let record = self.store.upsert_inventory(item).await?;
        tracing::info!(
            product_id = %record.product_id,
            quantity = record.quantity,
            "Inventory row written"
        );
        Ok(record)
    }

    pub async fn get(&self, product_id: ProductId) -> Result<InventoryRecord> {
        self.store
            .get_inventory(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Inventory", product_id))
    }

    pub async fn list(&self, page: Pagination) -> Result<Vec<InventoryRecord>> {
        Ok(self.store.list_inventory(page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        product_id: ProductId,
        changes: InventoryChanges,
    ) -> Result<InventoryRecord> {
        self.store
            .update_inventory(product_id, changes)
            .await?
            .ok_or_else(|| DomainError::not_found("Inventory", product_id))
    }

    /// Applies a signed delta to a product's stock.
    ///
    /// Without `allow_negative`, a delta that would take the quantity below
    /// zero is refused and nothing is written.
    #[tracing::instrument(skip(self))]
    pub async fn adjust(
        &self,
        product_id: ProductId,
        adjustment: AdjustInventory,
    ) -> Result<InventoryRecord> {
        let AdjustInventory {
            amount,
            allow_negative,
        } = adjustment;
        if !amount.is_finite() {
            return Err(ValidationError::new("amount", "must be a finite number").into());
        }

        match self
            .store
            .adjust_inventory(product_id, amount, allow_negative)
            .await?
        {
            AdjustOutcome::Applied(record) => {
                metrics::counter!("inventory_adjustments_total", "result" => "applied")
                    .increment(1);
                tracing::info!(
                    product_id = %product_id,
                    amount,
                    quantity = record.quantity,
                    "Inventory adjusted"
                );
                Ok(record)
            }
            AdjustOutcome::WouldGoNegative { current } => {
                metrics::counter!("inventory_adjustments_total", "result" => "refused")
                    .increment(1);
                tracing::warn!(product_id = %product_id, amount, current, "Adjustment refused");
                Err(DomainError::NegativeInventory { current, amount })
            }
            AdjustOutcome::Missing => Err(DomainError::not_found("Inventory", product_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    fn service() -> InventoryService<InMemoryStore> {
        InventoryService::new(InMemoryStore::new())
    }

    fn item(product_id: i64, quantity: f64) -> NewInventoryItem {
        NewInventoryItem {
            product_id: ProductId::new(product_id),
            quantity,
            location: None,
        }
    }

    #[tokio::test]
    async fn adjust_refuses_to_go_negative_without_flag() {
        let service = service();
        service.upsert(item(1, 3.0)).await.unwrap();

        let err = service
            .adjust(
                ProductId::new(1),
                AdjustInventory {
                    amount: -5.0,
                    allow_negative: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NegativeInventory { current, .. } if current == 3.0));
        assert_eq!(service.get(ProductId::new(1)).await.unwrap().quantity, 3.0);

        let forced = service
            .adjust(
                ProductId::new(1),
                AdjustInventory {
                    amount: -5.0,
                    allow_negative: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(forced.quantity, -2.0);
    }

    #[tokio::test]
    async fn adjust_on_missing_row_is_not_found() {
        let err = service()
            .adjust(
                ProductId::new(9),
                AdjustInventory {
                    amount: 1.0,
                    allow_negative: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "Inventory", .. }));
    }

    #[tokio::test]
    async fn update_requires_existing_row() {
        let service = service();
        let err = service
            .update(ProductId::new(4), InventoryChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[test]
    fn low_stock_is_inclusive_of_threshold() {
        let service = InventoryService::with_threshold(InMemoryStore::new(), 10.0);
        let mut record = InventoryRecord {
            id: store::InventoryItemId::new(1),
            product_id: ProductId::new(1),
            quantity: 10.0,
            location: None,
            last_updated: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };

        let alert = service.low_stock(&record).unwrap();
        assert_eq!(alert.current_quantity, 10.0);
        assert_eq!(alert.threshold, 10.0);

        record.quantity = 10.5;
        assert!(service.low_stock(&record).is_none());
    }

    #[test]
    fn create_request_validation() {
        let negative = CreateInventoryItem {
            product_id: ProductId::new(1),
            quantity: -1.0,
            location: None,
        };
        assert_eq!(negative.validate().unwrap_err().field, "quantity");

        let bad_product = CreateInventoryItem {
            product_id: ProductId::new(0),
            quantity: 1.0,
            location: None,
        };
        assert_eq!(bad_product.validate().unwrap_err().field, "product_id");
    }

    #[test]
    fn adjust_request_defaults_allow_negative_to_false() {
        let parsed: AdjustInventory = serde_json::from_str(r#"{"amount": -2}"#).unwrap();
        assert_eq!(
            parsed,
            AdjustInventory {
                amount: -2.0,
                allow_negative: false
            }
        );
    }
}
