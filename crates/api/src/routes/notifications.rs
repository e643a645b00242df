//! Notification endpoints.
//!
//! Creating or resending a notification answers immediately with the
//! `pending` row; delivery runs in a background task.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use domain::{CreateNotification, DeliveryChannel, NotificationFilter, NotificationService};
use store::{NotificationId, NotificationRecord, NotificationStore, Pagination};

use crate::error::ApiError;
use crate::extract::{Json, Path, Query};

pub type Notifications<S> = NotificationService<S, Arc<dyn DeliveryChannel>>;

pub type NotificationState<S> = Arc<Notifications<S>>;

fn process_in_background<S: NotificationStore + 'static>(
    service: NotificationState<S>,
    id: NotificationId,
) {
    tokio::spawn(async move {
        if let Err(e) = service.process(id).await {
            tracing::error!(notification_id = %id, error = %e, "Notification processing failed");
        }
    });
}

/// POST /notifications
#[tracing::instrument(skip(service, request), fields(kind = %request.kind))]
pub async fn create<S: NotificationStore + 'static>(
    State(service): State<NotificationState<S>>,
    Json(request): Json<CreateNotification>,
) -> Result<(StatusCode, Json<NotificationRecord>), ApiError> {
    let notification = service.create(request).await?;
    process_in_background(service, notification.id);
    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /notifications?skip&limit&status
pub async fn list<S: NotificationStore + 'static>(
    State(service): State<NotificationState<S>>,
    Query(page): Query<Pagination>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<NotificationRecord>>, ApiError> {
    Ok(Json(service.list(page, filter.status).await?))
}

/// GET /notifications/{id}
#[tracing::instrument(skip(service))]
pub async fn get<S: NotificationStore + 'static>(
    State(service): State<NotificationState<S>>,
    Path(id): Path<NotificationId>,
) -> Result<Json<NotificationRecord>, ApiError> {
    Ok(Json(service.get(id).await?))
}

/// POST /notifications/{id}/resend
#[tracing::instrument(skip(service))]
pub async fn resend<S: NotificationStore + 'static>(
    State(service): State<NotificationState<S>>,
    Path(id): Path<NotificationId>,
) -> Result<Json<NotificationRecord>, ApiError> {
    let notification = service.resend(id).await?;
    process_in_background(service, notification.id);
    Ok(Json(notification))
}
