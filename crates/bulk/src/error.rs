//! Error types for bulk operations.

use sluice_sequence::SequenceError;
use sluice_store::StoreError;
use thiserror::Error;

/// Errors surfaced by bulk operations.
///
/// Retriable failures are contained by the controller and only reach the
/// caller once the retry ceiling is exhausted, converted to `Fatal`.
/// Generations committed before a failure stay committed regardless of how
/// the operation ends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BulkError {
    /// Input sequence failure.
    #[error(transparent)]
    Sequence(SequenceError),

    /// Transient store or callback failure. Raising this from a processing
    /// callback triggers the same generation retry path as a retriable
    /// store error.
    #[error("retriable error: {0}")]
    Retriable(String),

    /// Non-retriable failure; the operation aborted.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Cooperative cancellation observed at a generation boundary or inside
    /// an in-flight store call.
    #[error("operation cancelled")]
    Cancelled,
}

impl From<SequenceError> for BulkError {
    fn from(err: SequenceError) -> Self {
        match err {
            SequenceError::Cancelled => BulkError::Cancelled,
            other => BulkError::Sequence(other),
        }
    }
}

impl From<StoreError> for BulkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Retriable(reason) => BulkError::Retriable(reason),
            StoreError::Fatal(reason) => BulkError::Fatal(reason),
        }
    }
}

/// Result type for bulk operations.
pub type Result<T> = std::result::Result<T, BulkError>;
