//! Order endpoints and the fulfillment job view.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use domain::{CreateOrder, UpdateOrderStatus};
use store::{OrderId, OrderRecord, OrderStore, Pagination};
use workflow::{FulfillmentQueue, InventoryClient, Job, Notifier, OrderWorkflow, ProductLookup};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

/// Order workflow wired to remote product, inventory and notification
/// services.
pub type OrderFlow<S> =
    OrderWorkflow<S, Arc<dyn ProductLookup>, Arc<dyn InventoryClient>, Arc<dyn Notifier>>;

/// Shared state of the order service.
pub struct OrderState<S: OrderStore> {
    pub workflow: Arc<OrderFlow<S>>,
    pub queue: FulfillmentQueue,
}

impl<S: OrderStore + 'static> OrderState<S> {
    /// Starts the fulfillment worker for `workflow`.
    pub fn start(workflow: OrderFlow<S>) -> Self {
        let workflow = Arc::new(workflow);
        let queue = FulfillmentQueue::start(workflow.clone());
        Self { workflow, queue }
    }
}

type SharedState<S> = State<Arc<OrderState<S>>>;

/// POST /orders: persists the order and queues its fulfillment.
#[tracing::instrument(skip(state, request))]
pub async fn create<S: OrderStore + 'static>(
    State(state): SharedState<S>,
    Json(request): Json<CreateOrder>,
) -> Result<(StatusCode, Json<OrderRecord>), ApiError> {
    let order = state.workflow.create_order(request).await?;
    state.queue.enqueue(order.id);
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders?skip&limit
pub async fn list<S: OrderStore + 'static>(
    State(state): SharedState<S>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<OrderRecord>>, ApiError> {
    Ok(Json(state.workflow.orders().list(page).await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): SharedState<S>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderRecord>, ApiError> {
    Ok(Json(state.workflow.orders().get(id).await?))
}

/// GET /orders/customer/{email}
#[tracing::instrument(skip(state))]
pub async fn by_customer<S: OrderStore + 'static>(
    State(state): SharedState<S>,
    Path(email): Path<String>,
) -> Result<Json<Vec<OrderRecord>>, ApiError> {
    Ok(Json(state.workflow.orders().list_by_email(&email).await?))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn update_status<S: OrderStore + 'static>(
    State(state): SharedState<S>,
    Path(id): Path<OrderId>,
    Json(request): Json<UpdateOrderStatus>,
) -> Result<Json<OrderRecord>, ApiError> {
    Ok(Json(state.workflow.update_status(id, request.status).await?))
}

/// GET /orders/{id}/fulfillment: state of the order's fulfillment job.
#[tracing::instrument(skip(state))]
pub async fn fulfillment<S: OrderStore + 'static>(
    State(state): SharedState<S>,
    Path(id): Path<OrderId>,
) -> Result<Json<Job>, ApiError> {
    state
        .queue
        .job(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No fulfillment job for order {id}")))
}
