//! Object-safe async contract for the transactional store.

use crate::Result;
use crate::types::{Key, KeyRange, KeyValue, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle to a store; hands out short-lived transactions.
///
/// The store is free to retry its own conflict errors inside a transaction;
/// the `Retriable`/`Fatal` split it reports upward is consumed by the bulk
/// engine's size/throughput adaptation, which is a separate outer layer.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Open a fresh transaction.
    async fn begin(&self) -> Result<Arc<dyn StoreTransaction>>;
}

/// One bounded-size, bounded-duration atomic unit of work.
///
/// Write methods take `&self`: implementations stage mutations internally
/// and apply them atomically on `commit`. The bulk engine opens exactly one
/// transaction per generation and finishes it before the next generation's
/// context exists.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Stage a write of `key = value`.
    fn set(&self, key: &[u8], value: &[u8]);

    /// Stage removal of `key`.
    fn clear(&self, key: &[u8]);

    /// Read up to `limit` pairs from `range`, in key order.
    async fn read_range(&self, range: &KeyRange, limit: usize) -> Result<Vec<KeyValue>>;

    /// Bulk point-read: one value-or-absent per requested key, in request
    /// order.
    async fn read_values(&self, keys: &[Key]) -> Result<Vec<Option<Value>>>;

    /// Atomically apply the staged writes. The transaction is finished
    /// afterwards regardless of the outcome.
    async fn commit(&self) -> Result<()>;

    /// Discard the staged writes. Safe to call after a failed `commit`.
    async fn rollback(&self) -> Result<()>;
}
