//! Stock level endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use domain::{AdjustInventory, CreateInventoryItem, UpdateInventoryItem};
use store::{InventoryRecord, InventoryStore, Pagination, ProductId};
use workflow::{Notifier, ProductLookup, StockKeeper};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

/// Stock keeper wired to remote product and notification services.
pub type Stock<S> = StockKeeper<S, Arc<dyn ProductLookup>, Arc<dyn Notifier>>;

pub type InventoryState<S> = Arc<Stock<S>>;

/// POST /inventory
#[tracing::instrument(skip(stock, request))]
pub async fn create<S: InventoryStore + 'static>(
    State(stock): State<InventoryState<S>>,
    Json(request): Json<CreateInventoryItem>,
) -> Result<(StatusCode, Json<InventoryRecord>), ApiError> {
    let item = stock.create(request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /inventory?skip&limit
pub async fn list<S: InventoryStore + 'static>(
    State(stock): State<InventoryState<S>>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<InventoryRecord>>, ApiError> {
    Ok(Json(stock.list(page).await?))
}

/// GET /inventory/{product_id}
#[tracing::instrument(skip(stock))]
pub async fn get<S: InventoryStore + 'static>(
    State(stock): State<InventoryState<S>>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<InventoryRecord>, ApiError> {
    Ok(Json(stock.get(product_id).await?))
}

/// PUT /inventory/{product_id}
#[tracing::instrument(skip(stock, request))]
pub async fn update<S: InventoryStore + 'static>(
    State(stock): State<InventoryState<S>>,
    Path(product_id): Path<ProductId>,
    Json(request): Json<UpdateInventoryItem>,
) -> Result<Json<InventoryRecord>, ApiError> {
    Ok(Json(stock.update(product_id, request).await?))
}

/// POST /inventory/{product_id}/adjust
#[tracing::instrument(skip(stock))]
pub async fn adjust<S: InventoryStore + 'static>(
    State(stock): State<InventoryState<S>>,
    Path(product_id): Path<ProductId>,
    Json(adjustment): Json<AdjustInventory>,
) -> Result<Json<InventoryRecord>, ApiError> {
    Ok(Json(stock.adjust(product_id, adjustment).await?))
}
