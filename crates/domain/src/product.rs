//! Product catalog rules.

use serde::Deserialize;
use store::{NewProduct, Pagination, ProductChanges, ProductId, ProductRecord, ProductStore};

use crate::error::{DomainError, Result};
use crate::validation::{self, Price, Sku, ValidationError};

/// Request body for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub sku: String,
}

impl CreateProduct {
    pub fn validate(self) -> std::result::Result<NewProduct, ValidationError> {
        Ok(NewProduct {
            name: validation::product_name(self.name)?,
            description: self.description.map(validation::description).transpose()?,
            price: Price::parse(self.price)?.value(),
            sku: Sku::parse(self.sku)?.into_inner(),
        })
    }
}

/// Request body for a partial product update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub sku: Option<String>,
}

impl UpdateProduct {
    pub fn validate(self) -> std::result::Result<ProductChanges, ValidationError> {
        Ok(ProductChanges {
            name: self.name.map(validation::product_name).transpose()?,
            description: self.description.map(validation::description).transpose()?,
            price: self
                .price
                .map(|p| Price::parse(p).map(|p| p.value()))
                .transpose()?,
            sku: self
                .sku
                .map(|s| Sku::parse(s).map(Sku::into_inner))
                .transpose()?,
        })
    }
}

/// Service for managing the product catalog.
pub struct ProductService<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> ProductService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create(&self, request: CreateProduct) -> Result<ProductRecord> {
        let product = self.store.insert_product(request.validate()?).await?;
        metrics::counter!("products_created_total").increment(1);
        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    pub async fn get(&self, id: ProductId) -> Result<ProductRecord> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    pub async fn get_by_sku(&self, sku: &str) -> Result<ProductRecord> {
        self.store
            .find_product_by_sku(sku)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", sku))
    }

    pub async fn list(&self, page: Pagination) -> Result<Vec<ProductRecord>> {
        Ok(self.store.list_products(page).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update(&self, id: ProductId, request: UpdateProduct) -> Result<ProductRecord> {
        let changes = request.validate()?;
        self.store
            .update_product(id, changes)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        if self.store.delete_product(id).await? {
            tracing::info!(product_id = %id, "Product deleted");
            Ok(())
        } else {
            Err(DomainError::not_found("Product", id))
        }
    }
}
