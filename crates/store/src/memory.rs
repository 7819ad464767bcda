//! In-memory store used by tests across the workspace.
//!
//! Close enough to a real ordered KV store for the bulk engine: ordered
//! range reads, staged writes applied atomically at commit, read-your-writes
//! inside a transaction, and injectable failures. A configurable write
//! budget per transaction reproduces the "transaction too large" class of
//! retriable error.

use crate::client::{StoreClient, StoreTransaction};
use crate::types::{Key, KeyRange, KeyValue, Value};
use crate::{Result, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Tunables for the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// Maximum staged writes a single transaction may commit. Exceeding it
    /// fails the commit with a retriable error, mimicking a store-side
    /// transaction size limit.
    pub max_writes_per_txn: Option<usize>,
}

#[derive(Debug, Default)]
struct Shared {
    data: BTreeMap<Key, Value>,
    /// Commits left to fail with an injected retriable error.
    failing_commits: usize,
    /// Reads left to fail with an injected retriable error.
    failing_reads: usize,
    commit_attempts: u64,
}

/// Shared in-memory store; cheap to clone across tasks.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    config: MemoryStoreConfig,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            config,
        }
    }

    /// Fail the next `n` commits with a retriable error.
    pub fn inject_commit_failures(&self, n: usize) {
        self.shared.lock().failing_commits = n;
    }

    /// Fail the next `n` range/point reads with a retriable error.
    pub fn inject_read_failures(&self, n: usize) {
        self.shared.lock().failing_reads = n;
    }

    /// Total commit attempts so far, including failed ones.
    pub fn commit_attempts(&self) -> u64 {
        self.shared.lock().commit_attempts
    }

    /// Number of committed keys.
    pub fn len(&self) -> usize {
        self.shared.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().data.is_empty()
    }

    /// Committed value for `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.shared.lock().data.get(key).cloned()
    }

    /// Snapshot of the full committed keyspace, in key order.
    pub fn snapshot(&self) -> Vec<KeyValue> {
        self.shared
            .lock()
            .data
            .iter()
            .map(|(k, v)| KeyValue::new(k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn begin(&self) -> Result<Arc<dyn StoreTransaction>> {
        Ok(Arc::new(MemoryTransaction {
            shared: self.shared.clone(),
            config: self.config.clone(),
            staged: Mutex::new(Vec::new()),
            state: Mutex::new(TxnState::Active),
        }))
    }
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Set(Key, Value),
    Clear(Key),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    RolledBack,
}

/// A transaction over [`MemoryStore`]: writes are staged and applied
/// atomically at commit; reads see committed data overlaid with this
/// transaction's own staged writes.
pub struct MemoryTransaction {
    shared: Arc<Mutex<Shared>>,
    config: MemoryStoreConfig,
    staged: Mutex<Vec<StagedWrite>>,
    state: Mutex<TxnState>,
}

impl MemoryTransaction {
    fn check_active(&self) -> Result<()> {
        match *self.state.lock() {
            TxnState::Active => Ok(()),
            state => Err(StoreError::Fatal(format!(
                "transaction already finished ({state:?})"
            ))),
        }
    }

    fn take_injected_read_failure(&self) -> Option<StoreError> {
        let mut shared = self.shared.lock();
        if shared.failing_reads > 0 {
            shared.failing_reads -= 1;
            Some(StoreError::Retriable("injected read failure".to_string()))
        } else {
            None
        }
    }

    /// Staged overlay for a single key: `Some(Some(v))` staged set,
    /// `Some(None)` staged clear, `None` untouched.
    fn staged_overlay(&self, key: &[u8]) -> Option<Option<Value>> {
        let staged = self.staged.lock();
        for write in staged.iter().rev() {
            match write {
                StagedWrite::Set(k, v) if k == key => return Some(Some(v.clone())),
                StagedWrite::Clear(k) if k == key => return Some(None),
                _ => {}
            }
        }
        None
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    fn set(&self, key: &[u8], value: &[u8]) {
        self.staged
            .lock()
            .push(StagedWrite::Set(key.to_vec(), value.to_vec()));
    }

    fn clear(&self, key: &[u8]) {
        self.staged.lock().push(StagedWrite::Clear(key.to_vec()));
    }

    async fn read_range(&self, range: &KeyRange, limit: usize) -> Result<Vec<KeyValue>> {
        self.check_active()?;
        if let Some(err) = self.take_injected_read_failure() {
            return Err(err);
        }

        let mut merged: BTreeMap<Key, Value> = {
            let shared = self.shared.lock();
            let bounds = (
                Bound::Included(range.begin.clone()),
                match &range.end {
                    Some(end) => Bound::Excluded(end.clone()),
                    None => Bound::Unbounded,
                },
            );
            shared
                .data
                .range(bounds)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };

        for write in self.staged.lock().iter() {
            match write {
                StagedWrite::Set(k, v) if range.contains(k) => {
                    merged.insert(k.clone(), v.clone());
                }
                StagedWrite::Clear(k) if range.contains(k) => {
                    merged.remove(k);
                }
                _ => {}
            }
        }

        Ok(merged
            .into_iter()
            .take(limit)
            .map(|(key, value)| KeyValue { key, value })
            .collect())
    }

    async fn read_values(&self, keys: &[Key]) -> Result<Vec<Option<Value>>> {
        self.check_active()?;
        if let Some(err) = self.take_injected_read_failure() {
            return Err(err);
        }

        let shared = self.shared.lock();
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match self.staged_overlay(key) {
                Some(overlay) => overlay,
                None => shared.data.get(key).cloned(),
            };
            values.push(value);
        }
        Ok(values)
    }

    async fn commit(&self) -> Result<()> {
        self.check_active()?;

        let mut shared = self.shared.lock();
        shared.commit_attempts += 1;

        if shared.failing_commits > 0 {
            shared.failing_commits -= 1;
            tracing::debug!("memory store: failing commit by injection");
            return Err(StoreError::Retriable("injected commit failure".to_string()));
        }

        let staged = self.staged.lock();
        if let Some(budget) = self.config.max_writes_per_txn {
            if staged.len() > budget {
                tracing::debug!(
                    staged = staged.len(),
                    budget,
                    "memory store: transaction over write budget"
                );
                return Err(StoreError::Retriable(format!(
                    "transaction too large: {} writes over budget {}",
                    staged.len(),
                    budget
                )));
            }
        }

        for write in staged.iter() {
            match write {
                StagedWrite::Set(k, v) => {
                    shared.data.insert(k.clone(), v.clone());
                }
                StagedWrite::Clear(k) => {
                    shared.data.remove(k);
                }
            }
        }
        *self.state.lock() = TxnState::Committed;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.staged.lock().clear();
        *self.state.lock() = TxnState::RolledBack;
        Ok(())
    }
}
