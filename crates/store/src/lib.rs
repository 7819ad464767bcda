//! Store contract for the bulk engine
//!
//! This crate defines the narrow interface the bulk layer consumes from a
//! transactional, ordered key-value store: open a transaction, read ranges
//! and points, stage writes, commit. It also ships an in-memory store so the
//! other crates can exercise full bulk operations in tests without a real
//! cluster.

pub mod client;
pub mod memory;
pub mod types;

pub use client::{StoreClient, StoreTransaction};
pub use memory::{MemoryStore, MemoryStoreConfig};
pub use types::{Key, KeyRange, KeyValue, Value, key_successor, prefix_successor};

use thiserror::Error;

/// Errors surfaced by store operations.
///
/// The split drives the bulk engine's retry policy: `Retriable` failures are
/// contained by the adaptive controller, `Fatal` failures abort the whole
/// operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transient failure; the same work may be re-attempted.
    #[error("retriable store error: {0}")]
    Retriable(String),

    /// Non-retriable failure; the enclosing operation must abort.
    #[error("fatal store error: {0}")]
    Fatal(String),
}

impl StoreError {
    /// Whether the bulk engine is allowed to re-attempt the failed work.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Retriable(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
