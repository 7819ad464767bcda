//! Bulk write and insert.

use super::{GenerationDriver, next_chunk, push_back_chunk, with_cancel};
use crate::{BulkConfig, BulkError, Result};
use sluice_sequence::{FetchMode, Sequence, SequenceIter};
use sluice_store::{Key, StoreClient, StoreTransaction, Value};
use std::collections::VecDeque;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Write every `(key, value)` pair of `source`, splitting the work into
/// committed generations. Returns the total pair count.
pub async fn write(
    store: &dyn StoreClient,
    source: &dyn Sequence<(Key, Value)>,
    config: &BulkConfig,
    cancel: &CancellationToken,
) -> Result<u64> {
    write_with_progress(store, source, config, |_| {}, cancel).await
}

/// [`write`] with a cumulative-count progress callback.
///
/// `progress` runs inline after each successful commit with a strictly
/// increasing count; its final value equals the returned total and is
/// delivered before the operation returns.
pub async fn write_with_progress<P>(
    store: &dyn StoreClient,
    source: &dyn Sequence<(Key, Value)>,
    config: &BulkConfig,
    mut progress: P,
    cancel: &CancellationToken,
) -> Result<u64>
where
    P: FnMut(u64),
{
    let mut iter = source.open(FetchMode::Iterator)?;
    let result = write_loop(store, iter.as_mut(), config, &mut progress, cancel).await;
    iter.dispose();
    result
}

async fn write_loop<P>(
    store: &dyn StoreClient,
    iter: &mut dyn SequenceIter<(Key, Value)>,
    config: &BulkConfig,
    progress: &mut P,
    cancel: &CancellationToken,
) -> Result<u64>
where
    P: FnMut(u64),
{
    let mut driver = GenerationDriver::new(config);
    let mut pending: VecDeque<(Key, Value)> = VecDeque::new();

    loop {
        if cancel.is_cancelled() {
            return Err(BulkError::Cancelled);
        }

        let chunk = next_chunk(&mut pending, iter, driver.step(), cancel).await?;
        if chunk.is_empty() {
            break;
        }

        let gen_start = Instant::now();
        let txn = with_cancel(cancel, store.begin()).await??;
        for (key, value) in &chunk {
            txn.set(key, value);
        }

        match with_cancel(cancel, txn.commit()).await? {
            Ok(()) => {
                driver.complete_generation(chunk.len(), gen_start.elapsed());
                progress(driver.position());
            }
            Err(err) if err.is_retriable() => {
                let _ = txn.rollback().await;
                driver.retry_generation(&err.to_string(), cancel).await?;
                push_back_chunk(&mut pending, chunk);
            }
            Err(err) => {
                let _ = txn.rollback().await;
                return Err(err.into());
            }
        }
    }

    Ok(driver.position())
}

/// Generational insert where the caller derives keys and values per item.
///
/// `writer_fn` runs once per item per *attempt* inside the generation's
/// transaction, so a retried generation re-invokes it for that generation's
/// items; keep it idempotent with respect to the store. Returns the total
/// item count.
pub async fn insert<T, W>(
    store: &dyn StoreClient,
    source: &dyn Sequence<T>,
    config: &BulkConfig,
    mut writer_fn: W,
    cancel: &CancellationToken,
) -> Result<u64>
where
    T: Send + 'static,
    W: FnMut(&T, &dyn StoreTransaction) -> Result<()>,
{
    let mut iter = source.open(FetchMode::Iterator)?;
    let result = insert_loop(store, iter.as_mut(), config, &mut writer_fn, cancel).await;
    iter.dispose();
    result
}

async fn insert_loop<T, W>(
    store: &dyn StoreClient,
    iter: &mut dyn SequenceIter<T>,
    config: &BulkConfig,
    writer_fn: &mut W,
    cancel: &CancellationToken,
) -> Result<u64>
where
    T: Send + 'static,
    W: FnMut(&T, &dyn StoreTransaction) -> Result<()>,
{
    let mut driver = GenerationDriver::new(config);
    let mut pending: VecDeque<T> = VecDeque::new();

    loop {
        if cancel.is_cancelled() {
            return Err(BulkError::Cancelled);
        }

        let chunk = next_chunk(&mut pending, iter, driver.step(), cancel).await?;
        if chunk.is_empty() {
            break;
        }

        let gen_start = Instant::now();
        let txn = with_cancel(cancel, store.begin()).await??;

        let mut write_error = None;
        for item in &chunk {
            if let Err(err) = writer_fn(item, txn.as_ref()) {
                write_error = Some(err);
                break;
            }
        }

        match write_error {
            Some(BulkError::Retriable(reason)) => {
                let _ = txn.rollback().await;
                driver.retry_generation(&reason, cancel).await?;
                push_back_chunk(&mut pending, chunk);
                continue;
            }
            Some(err) => {
                let _ = txn.rollback().await;
                return Err(err);
            }
            None => {}
        }

        match with_cancel(cancel, txn.commit()).await? {
            Ok(()) => {
                driver.complete_generation(chunk.len(), gen_start.elapsed());
            }
            Err(err) if err.is_retriable() => {
                let _ = txn.rollback().await;
                driver.retry_generation(&err.to_string(), cancel).await?;
                push_back_chunk(&mut pending, chunk);
            }
            Err(err) => {
                let _ = txn.rollback().await;
                return Err(err.into());
            }
        }
    }

    Ok(driver.position())
}
