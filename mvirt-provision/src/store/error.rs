//! Store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another writer changed the record (optimistic concurrency control).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Record could not be parsed or is otherwise unusable.
    #[error("invalid record: {0}")]
    Invalid(String),

    /// Internal error (I/O, backend unavailable).
    #[error("internal: {0}")]
    Internal(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
