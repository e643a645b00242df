//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The input was rejected before touching storage.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// A stock adjustment would take the quantity below zero.
    #[error("Adjustment would cause negative inventory")]
    NegativeInventory { current: f64, amount: f64 },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(message) => DomainError::Conflict(message),
            other => DomainError::Store(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
