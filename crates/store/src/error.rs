use thiserror::Error;

/// Errors that can occur when reading or writing the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (duplicate SKU, second
    /// inventory row for a product).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded into its domain type.
    #[error("Corrupt row: {0}")]
    Decode(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
