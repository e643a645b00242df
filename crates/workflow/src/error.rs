//! Workflow error types.

use domain::DomainError;
use store::{OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur while coordinating services.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A product referenced by an order line does not resolve.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// A product referenced by a stock row does not resolve.
    #[error("Product not found")]
    UnknownProduct(ProductId),

    /// The order to fulfill or update does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A collaborator could not be reached.
    #[error("{service} service unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },

    /// A collaborator answered with a status the caller does not handle.
    #[error("{service} service returned {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    /// Domain error.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl WorkflowError {
    pub(crate) fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        WorkflowError::Unavailable {
            service,
            reason: reason.to_string(),
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
