//! Inventory collaborator trait and implementations.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::AdjustInventory;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use store::ProductId;

use super::join_url;
use crate::error::{Result, WorkflowError};

/// Trait for stock checks and adjustments.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Returns true if at least `quantity` of the product is on hand. A
    /// product without a stock row has none.
    async fn check(&self, product_id: ProductId, quantity: f64) -> Result<bool>;

    /// Applies a signed delta and returns the new quantity.
    async fn adjust(&self, product_id: ProductId, delta: f64, allow_negative: bool)
    -> Result<f64>;
}

#[async_trait]
impl<T: InventoryClient + ?Sized> InventoryClient for Arc<T> {
    async fn check(&self, product_id: ProductId, quantity: f64) -> Result<bool> {
        (**self).check(product_id, quantity).await
    }

    async fn adjust(
        &self,
        product_id: ProductId,
        delta: f64,
        allow_negative: bool,
    ) -> Result<f64> {
        (**self).adjust(product_id, delta, allow_negative).await
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<ProductId, f64>,
    checks: Vec<ProductId>,
    adjustments: Vec<(ProductId, f64)>,
    unavailable: bool,
    failing_adjustments: HashSet<ProductId>,
}

/// In-memory inventory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stock(&self, product_id: i64, quantity: f64) {
        self.state
            .write()
            .unwrap()
            .stock
            .insert(ProductId::new(product_id), quantity);
    }

    pub fn stock(&self, product_id: i64) -> Option<f64> {
        self.state
            .read()
            .unwrap()
            .stock
            .get(&ProductId::new(product_id))
            .copied()
    }

    /// Makes every following call fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Makes adjustments of one product fail.
    pub fn fail_adjustments_for(&self, product_id: i64) {
        self.state
            .write()
            .unwrap()
            .failing_adjustments
            .insert(ProductId::new(product_id));
    }

    /// Products checked so far, in call order.
    pub fn checks(&self) -> Vec<ProductId> {
        self.state.read().unwrap().checks.clone()
    }

    /// Applied adjustments so far, in call order.
    pub fn adjustments(&self) -> Vec<(ProductId, f64)> {
        self.state.read().unwrap().adjustments.clone()
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn check(&self, product_id: ProductId, quantity: f64) -> Result<bool> {
        let mut state = self.state.write().unwrap();
        state.checks.push(product_id);
        if state.unavailable {
            return Err(WorkflowError::unavailable("inventory", "connection refused"));
        }
        Ok(state
            .stock
            .get(&product_id)
            .is_some_and(|on_hand| *on_hand >= quantity))
    }

    async fn adjust(
        &self,
        product_id: ProductId,
        delta: f64,
        allow_negative: bool,
    ) -> Result<f64> {
        let mut state = self.state.write().unwrap();
        if state.unavailable || state.failing_adjustments.contains(&product_id) {
            return Err(WorkflowError::unavailable("inventory", "connection refused"));
        }
        let Some(on_hand) = state.stock.get(&product_id).copied() else {
            return Err(WorkflowError::UnexpectedStatus {
                service: "inventory",
                status: 404,
            });
        };
        let next = on_hand + delta;
        if next < 0.0 && !allow_negative {
            return Err(WorkflowError::UnexpectedStatus {
                service: "inventory",
                status: 400,
            });
        }
        state.stock.insert(product_id, next);
        state.adjustments.push((product_id, delta));
        Ok(next)
    }
}

#[derive(Debug, Deserialize)]
struct StockLevel {
    quantity: f64,
}

/// Inventory client against the inventory service.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: String,
}

impl HttpInventoryClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip(self))]
    async fn check(&self, product_id: ProductId, quantity: f64) -> Result<bool> {
        let response = self
            .client
            .get(join_url(&self.base_url, &format!("/inventory/{product_id}")))
            .send()
            .await
            .map_err(|e| WorkflowError::unavailable("inventory", e))?;

        match response.status() {
            StatusCode::OK => {
                let level: StockLevel = response
                    .json()
                    .await
                    .map_err(|e| WorkflowError::unavailable("inventory", e))?;
                Ok(level.quantity >= quantity)
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(WorkflowError::UnexpectedStatus {
                service: "inventory",
                status: status.as_u16(),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn adjust(
        &self,
        product_id: ProductId,
        delta: f64,
        allow_negative: bool,
    ) -> Result<f64> {
        let response = self
            .client
            .post(join_url(
                &self.base_url,
                &format!("/inventory/{product_id}/adjust"),
            ))
            .json(&AdjustInventory {
                amount: delta,
                allow_negative,
            })
            .send()
            .await
            .map_err(|e| WorkflowError::unavailable("inventory", e))?;

        if response.status() != StatusCode::OK {
            return Err(WorkflowError::UnexpectedStatus {
                service: "inventory",
                status: response.status().as_u16(),
            });
        }
        let level: StockLevel = response
            .json()
            .await
            .map_err(|e| WorkflowError::unavailable("inventory", e))?;
        Ok(level.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_compares_on_hand_quantity() {
        let inventory = InMemoryInventoryClient::new();
        inventory.set_stock(1, 5.0);

        assert!(inventory.check(ProductId::new(1), 5.0).await.unwrap());
        assert!(!inventory.check(ProductId::new(1), 5.5).await.unwrap());
        assert!(!inventory.check(ProductId::new(2), 1.0).await.unwrap());
    }

    #[tokio::test]
    async fn adjust_refuses_negative_unless_allowed() {
        let inventory = InMemoryInventoryClient::new();
        inventory.set_stock(1, 2.0);

        assert!(inventory.adjust(ProductId::new(1), -3.0, false).await.is_err());
        assert_eq!(inventory.adjust(ProductId::new(1), -3.0, true).await.unwrap(), -1.0);
        assert_eq!(inventory.adjustments(), vec![(ProductId::new(1), -3.0)]);
    }

    #[tokio::test]
    async fn failing_product_only_affects_its_adjustments() {
        let inventory = InMemoryInventoryClient::new();
        inventory.set_stock(1, 10.0);
        inventory.set_stock(2, 10.0);
        inventory.fail_adjustments_for(2);

        assert!(inventory.adjust(ProductId::new(2), -1.0, false).await.is_err());
        assert_eq!(inventory.adjust(ProductId::new(1), -1.0, false).await.unwrap(), 9.0);
        assert_eq!(inventory.stock(2), Some(10.0));
    }
}
