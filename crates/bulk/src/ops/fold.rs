//! Chunked read-and-fold operations.

use super::{GenerationDriver, next_chunk, push_back_chunk, with_cancel};
use crate::context::GenerationContext;
use crate::{BulkConfig, BulkError, Result};
use sluice_sequence::{FetchMode, Sequence, SequenceIter};
use sluice_store::{Key, StoreClient};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fold chunks of `keys` through `chunk_fn`, threading accumulator state
/// across generations.
///
/// Per generation the engine opens one transaction and hands it to
/// `chunk_fn` via the [`GenerationContext`]; the callback issues the
/// chunk's bulk point-read itself (`ctx.transaction().read_values(..)`) and
/// returns the updated state, which is carried into the next generation.
/// Generation N+1 does not begin before N's callback has returned and its
/// transaction committed.
///
/// `S: Clone` because the engine snapshots the accumulator before each
/// attempt: a retried generation re-runs from the pre-attempt state, so a
/// callback that failed half-way can never double-count.
pub async fn for_each_fold<S, I, F, Fut>(
    store: &dyn StoreClient,
    keys: &dyn Sequence<Key>,
    config: &BulkConfig,
    init: I,
    mut chunk_fn: F,
    cancel: &CancellationToken,
) -> Result<S>
where
    S: Clone + Send,
    I: FnOnce() -> S,
    F: FnMut(Vec<Key>, GenerationContext, S) -> Fut,
    Fut: Future<Output = Result<S>> + Send,
{
    let mut iter = keys.open(FetchMode::Iterator)?;
    let result = fold_loop(store, iter.as_mut(), config, init(), &mut chunk_fn, cancel).await;
    iter.dispose();
    result
}

async fn fold_loop<S, F, Fut>(
    store: &dyn StoreClient,
    iter: &mut dyn SequenceIter<Key>,
    config: &BulkConfig,
    mut state: S,
    chunk_fn: &mut F,
    cancel: &CancellationToken,
) -> Result<S>
where
    S: Clone + Send,
    F: FnMut(Vec<Key>, GenerationContext, S) -> Fut,
    Fut: Future<Output = Result<S>> + Send,
{
    let mut driver = GenerationDriver::new(config);
    let mut pending: VecDeque<Key> = VecDeque::new();

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
        let ctx = driver.context(txn.clone(), gen_start);

        let attempt_state = state.clone();
        let attempt = with_cancel(cancel, chunk_fn(chunk.clone(), ctx, attempt_state)).await?;

        match attempt {
            Ok(new_state) => match with_cancel(cancel, txn.commit()).await? {
                Ok(()) => {
                    state = new_state;
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
            },
            Err(BulkError::Retriable(reason)) => {
                let _ = txn.rollback().await;
                driver.retry_generation(&reason, cancel).await?;
                push_back_chunk(&mut pending, chunk);
            }
            Err(err) => {
                let _ = txn.rollback().await;
                return Err(err);
            }
        }
    }

    Ok(state)
}

/// Stateless chunk visitor over `keys`. Returns the total key count.
pub async fn for_each<F, Fut>(
    store: &dyn StoreClient,
    keys: &dyn Sequence<Key>,
    config: &BulkConfig,
    mut chunk_fn: F,
    cancel: &CancellationToken,
) -> Result<u64>
where
    F: FnMut(Vec<Key>, GenerationContext) -> Fut,
    Fut: Future<Output = Result<()>> + Send,
{
    for_each_fold(
        store,
        keys,
        config,
        || 0u64,
        |chunk, ctx, visited| {
            let len = chunk.len() as u64;
            let fut = chunk_fn(chunk, ctx);
            async move {
                fut.await?;
                Ok(visited + len)
            }
        },
        cancel,
    )
    .await
}

/// [`for_each_fold`] with a final transform applied exactly once, after the
/// last generation; intermediate state never sees it.
pub async fn aggregate<S, R, I, F, Fut, Fin>(
    store: &dyn StoreClient,
    keys: &dyn Sequence<Key>,
    config: &BulkConfig,
    init: I,
    chunk_fn: F,
    finish: Fin,
    cancel: &CancellationToken,
) -> Result<R>
where
    S: Clone + Send,
    I: FnOnce() -> S,
    F: FnMut(Vec<Key>, GenerationContext, S) -> Fut,
    Fut: Future<Output = Result<S>> + Send,
    Fin: FnOnce(S) -> R,
{
    let state = for_each_fold(store, keys, config, init, chunk_fn, cancel).await?;
    Ok(finish(state))
}
