//! Product catalog endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use domain::{CreateProduct, ProductService, UpdateProduct};
use store::{Pagination, ProductId, ProductRecord, ProductStore};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

pub type ProductState<S> = Arc<ProductService<S>>;

/// POST /products
#[tracing::instrument(skip(service, request))]
pub async fn create<S: ProductStore + 'static>(
    State(service): State<ProductState<S>>,
    Json(request): Json<CreateProduct>,
) -> Result<(StatusCode, Json<ProductRecord>), ApiError> {
    let product = service.create(request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products?skip&limit
pub async fn list<S: ProductStore + 'static>(
    State(service): State<ProductState<S>>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ProductRecord>>, ApiError> {
    Ok(Json(service.list(page).await?))
}

/// GET /products/{id}
#[tracing::instrument(skip(service))]
pub async fn get<S: ProductStore + 'static>(
    State(service): State<ProductState<S>>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductRecord>, ApiError> {
    Ok(Json(service.get(id).await?))
}

/// GET /products/sku/{sku}
#[tracing::instrument(skip(service))]
pub async fn get_by_sku<S: ProductStore + 'static>(
    State(service): State<ProductState<S>>,
    Path(sku): Path<String>,
) -> Result<Json<ProductRecord>, ApiError> {
    Ok(Json(service.get_by_sku(&sku).await?))
}

/// PUT /products/{id}
#[tracing::instrument(skip(service, request))]
pub async fn update<S: ProductStore + 'static>(
    State(service): State<ProductState<S>>,
    Path(id): Path<ProductId>,
    Json(request): Json<UpdateProduct>,
) -> Result<Json<ProductRecord>, ApiError> {
    Ok(Json(service.update(id, request).await?))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(service))]
pub async fn delete<S: ProductStore + 'static>(
    State(service): State<ProductState<S>>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
