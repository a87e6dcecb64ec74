//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened or created.
    #[error("database error: {0}")]
    Database(String),

    /// A transaction could not be started or committed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A table could not be opened.
    #[error("table error: {0}")]
    Table(String),

    /// A write was attempted on a read-only transaction.
    #[error("write attempted on read-only transaction")]
    ReadOnly,

    /// An I/O error occurred.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend reported corrupted or unreadable data.
    #[error("storage corruption: {0}")]
    Corruption(String),
}
