//! Product lookup collaborator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use store::ProductId;

use super::join_url;
use crate::error::{Result, WorkflowError};

/// The product fields other services need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
}

/// Trait for resolving product ids.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Returns the product, or None if it does not exist.
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductInfo>>;
}

#[async_trait]
impl<T: ProductLookup + ?Sized> ProductLookup for Arc<T> {
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductInfo>> {
        (**self).get_product(id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryProductState {
    products: HashMap<ProductId, ProductInfo>,
    lookups: Vec<ProductId>,
    unavailable: bool,
}

/// In-memory product lookup for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductLookup {
    state: Arc<RwLock<InMemoryProductState>>,
}

impl InMemoryProductLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product priced at `price`.
    pub fn add_product(&self, id: i64, price: f64) -> ProductInfo {
        let product = ProductInfo {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            sku: format!("SKU-{id:03}"),
            description: None,
            price,
        };
        self.state
            .write()
            .unwrap()
            .products
            .insert(product.id, product.clone());
        product
    }

    /// Makes every following lookup fail as if the service were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the ids looked up so far, in call order.
    pub fn lookups(&self) -> Vec<ProductId> {
        self.state.read().unwrap().lookups.clone()
    }
}

#[async_trait]
impl ProductLookup for InMemoryProductLookup {
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductInfo>> {
        let mut state = self.state.write().unwrap();
        state.lookups.push(id);
        if state.unavailable {
            return Err(WorkflowError::unavailable("product", "connection refused"));
        }
        Ok(state.products.get(&id).cloned())
    }
}

/// Product lookup against the product service (`GET /products/{id}`).
#[derive(Debug, Clone)]
pub struct HttpProductLookup {
    client: Client,
    base_url: String,
}

impl HttpProductLookup {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProductLookup for HttpProductLookup {
    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductInfo>> {
        let response = self
            .client
            .get(join_url(&self.base_url, &format!("/products/{id}")))
            .send()
            .await
            .map_err(|e| WorkflowError::unavailable("product", e))?;

        match response.status() {
            StatusCode::OK => response
                .json::<ProductInfo>()
                .await
                .map(Some)
                .map_err(|e| WorkflowError::unavailable("product", e)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(WorkflowError::UnexpectedStatus {
                service: "product",
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_lookup_records_calls() {
        let lookup = InMemoryProductLookup::new();
        lookup.add_product(1, 10.0);

        assert_eq!(
            lookup.get_product(ProductId::new(1)).await.unwrap().unwrap().price,
            10.0
        );
        assert!(lookup.get_product(ProductId::new(2)).await.unwrap().is_none());
        assert_eq!(lookup.lookups(), vec![ProductId::new(1), ProductId::new(2)]);
    }

    #[tokio::test]
    async fn unavailable_lookup_errors() {
        let lookup = InMemoryProductLookup::new();
        lookup.set_unavailable(true);
        let err = lookup.get_product(ProductId::new(1)).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Unavailable { service: "product", .. }));
    }
}
