//! Ordered whole-range export to a caller sink.

use super::{GenerationDriver, with_cancel};
use crate::{BulkConfig, BulkError, Result};
use sluice_store::{KeyRange, KeyValue, StoreClient, key_successor};
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Scan `range` in key order and deliver each chunk to `sink_fn` together
/// with the chunk's starting global position.
///
/// Chunks arrive in non-decreasing key order with no duplicate and no gap:
/// `start[i] + len[i] == start[i + 1]`. The chunk is read and its
/// transaction committed *before* the sink runs, so a retried read never
/// re-delivers; the sink's latency still lands inside the generation's
/// timing window, which is how a slow sink shrinks the next step. Returns
/// the total pair count delivered.
pub async fn export<F, Fut>(
    store: &dyn StoreClient,
    range: &KeyRange,
    config: &BulkConfig,
    mut sink_fn: F,
    cancel: &CancellationToken,
) -> Result<u64>
where
    F: FnMut(Vec<KeyValue>, u64, CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>> + Send,
{
    let mut driver = GenerationDriver::new(config);
    let mut cursor = range.begin.clone();

    loop {
        if cancel.is_cancelled() {
            return Err(BulkError::Cancelled);
        }
        if let Some(end) = &range.end {
            if &cursor >= end {
                break;
            }
        }

        let window = KeyRange {
            begin: cursor.clone(),
            end: range.end.clone(),
        };

        let gen_start = Instant::now();
        let txn = with_cancel(cancel, store.begin()).await??;

        let chunk = match with_cancel(cancel, txn.read_range(&window, driver.step())).await? {
            Ok(chunk) => chunk,
            Err(err) if err.is_retriable() => {
                let _ = txn.rollback().await;
                driver.retry_generation(&err.to_string(), cancel).await?;
                continue;
            }
            Err(err) => {
                let _ = txn.rollback().await;
                return Err(err.into());
            }
        };

        // read-only generation: commit before delivery so the sink never
        // sees a chunk twice
        match with_cancel(cancel, txn.commit()).await? {
            Ok(()) => {}
            Err(err) if err.is_retriable() => {
                driver.retry_generation(&err.to_string(), cancel).await?;
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        if chunk.is_empty() {
            break;
        }

        let start_position = driver.position();
        let count = chunk.len();
        if let Some(last) = chunk.last() {
            cursor = key_successor(&last.key);
        }

        sink_fn(chunk, start_position, cancel.clone()).await?;
        driver.complete_generation(count, gen_start.elapsed());
    }

    Ok(driver.position())
}
