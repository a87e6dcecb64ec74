//! Error types for the execution pipeline.
//!
//! Every error in this taxonomy is fatal to the query it occurs in: no stage
//! attempts partial recovery, and nothing here is retried. Programming
//! errors (contract violations such as advancing an unproduced output row)
//! are not represented as errors at all; they are `debug_assert`ed at the
//! violation site.

use cascadedb_core::CoreError;
use cascadedb_storage::StorageError;
use thiserror::Error;

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors that can occur while executing a query pipeline.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The query was cancelled cooperatively.
    #[error("query cancelled")]
    Cancelled,

    /// A query-scoped resource ceiling was exceeded.
    #[error("resource limit exceeded: {resource}")]
    ResourceLimitExceeded {
        /// Which limit was hit (e.g. "sort memory", "spill store bytes").
        resource: String,
    },

    /// The external spill store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A value could not be encoded for the spill store.
    #[error("encoding error: {0}")]
    Encoding(#[from] CoreError),

    /// An expression collaborator failed to evaluate a row.
    #[error("expression error: {0}")]
    Expression(String),
}

impl ExecError {
    /// Creates a resource-limit error for the named resource.
    #[must_use]
    pub fn resource_limit(resource: impl Into<String>) -> Self {
        Self::ResourceLimitExceeded { resource: resource.into() }
    }
}
