//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use workflow::WorkflowError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// A backend service could not be reached.
    Unavailable(String),
    /// An upstream answer relayed with its own status.
    Upstream(StatusCode, String),
    /// Domain logic error.
    Domain(DomainError),
    /// Cross-service workflow error.
    Workflow(WorkflowError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Upstream(status, msg) => (status, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Workflow(err) => workflow_error_to_response(err),
            ApiError::Internal(msg) => internal(msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: String) -> (StatusCode, String) {
    tracing::error!(error = %msg, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, msg)
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Validation(_) | DomainError::NegativeInventory { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
        DomainError::Store(_) => internal(err.to_string()),
    }
}

fn workflow_error_to_response(err: WorkflowError) -> (StatusCode, String) {
    match err {
        WorkflowError::ProductNotFound(_)
        | WorkflowError::UnknownProduct(_)
        | WorkflowError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        WorkflowError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        WorkflowError::UnexpectedStatus { .. } => (StatusCode::BAD_GATEWAY, err.to_string()),
        WorkflowError::Domain(err) => domain_error_to_response(err),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use domain::ValidationError;
    use store::{OrderId, ProductId};

    use super::*;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn domain_errors_map_to_client_statuses() {
        assert_eq!(
            status_of(DomainError::from(ValidationError::new("price", "must be greater than 0"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DomainError::not_found("Product", 3)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DomainError::Conflict("SKU already registered".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DomainError::NegativeInventory {
                current: 1.0,
                amount: -2.0
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn workflow_errors_map_to_statuses() {
        assert_eq!(
            status_of(WorkflowError::ProductNotFound(ProductId::new(9))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(WorkflowError::OrderNotFound(OrderId::new(9))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(WorkflowError::Unavailable {
                service: "inventory",
                reason: "timeout".into()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(WorkflowError::Domain(DomainError::Conflict("taken".into()))),
            StatusCode::CONFLICT
        );
    }
}
