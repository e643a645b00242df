//! Stock mutations that span services.

use domain::{
    AdjustInventory, CreateInventoryItem, DomainError, InventoryService, LOW_STOCK,
    UpdateInventoryItem,
};
use store::{InventoryRecord, InventoryStore, Pagination, ProductId};

use crate::error::{Result, WorkflowError};
use crate::services::{Notifier, ProductLookup};

/// Wraps [`InventoryService`] with the cross-service rules of the
/// inventory service: rows may only be written for products that exist,
/// and every write that leaves a product at or below the threshold posts a
/// `low_stock` notification.
pub struct StockKeeper<S, P, N>
where
    S: InventoryStore,
    P: ProductLookup,
    N: Notifier,
{
    inventory: InventoryService<S>,
    products: P,
    notifier: N,
}

impl<S, P, N> StockKeeper<S, P, N>
where
    S: InventoryStore,
    P: ProductLookup,
    N: Notifier,
{
    pub fn new(inventory: InventoryService<S>, products: P, notifier: N) -> Self {
        Self {
            inventory,
            products,
            notifier,
        }
    }

    pub fn inventory(&self) -> &InventoryService<S> {
        &self.inventory
    }

    pub async fn get(&self, product_id: ProductId) -> Result<InventoryRecord> {
        Ok(self.inventory.get(product_id).await?)
    }

    pub async fn list(&self, page: Pagination) -> Result<Vec<InventoryRecord>> {
        Ok(self.inventory.list(page).await?)
    }

    /// Creates the stock row for a product, or overwrites the existing one.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn create(&self, request: CreateInventoryItem) -> Result<InventoryRecord> {
        let item = request.validate().map_err(DomainError::from)?;
        self.require_product(item.product_id).await?;
        let record = self.inventory.upsert(item).await?;
        self.alert_if_low(&record).await;
        Ok(record)
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn update(
        &self,
        product_id: ProductId,
        request: UpdateInventoryItem,
    ) -> Result<InventoryRecord> {
        let changes = request.validate().map_err(DomainError::from)?;
        self.require_product(product_id).await?;
        let record = self.inventory.update(product_id, changes).await?;
        self.alert_if_low(&record).await;
        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    pub async fn adjust(
        &self,
        product_id: ProductId,
        adjustment: AdjustInventory,
    ) -> Result<InventoryRecord> {
        let record = self.inventory.adjust(product_id, adjustment).await?;
        self.alert_if_low(&record).await;
        Ok(record)
    }

    async fn require_product(&self, product_id: ProductId) -> Result<()> {
        match self.products.get_product(product_id).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(WorkflowError::UnknownProduct(product_id)),
            Err(e) => {
                tracing::error!(%product_id, error = %e, "Product lookup failed");
                Err(WorkflowError::UnknownProduct(product_id))
            }
        }
    }

    async fn alert_if_low(&self, record: &InventoryRecord) {
        let Some(alert) = self.inventory.low_stock(record) else {
            return;
        };
        tracing::warn!(
            product_id = %alert.product_id,
            quantity = alert.current_quantity,
            threshold = alert.threshold,
            "Stock at or below threshold"
        );
        let data = match serde_json::to_value(alert) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "Could not encode low stock alert");
                return;
            }
        };
        if let Err(e) = self.notifier.notify(LOW_STOCK, data).await {
            tracing::error!(error = %e, "Failed to send low stock notification");
        }
    }
}
