//! Generation-driven bulk operations.
//!
//! Each operation runs the same outer loop: pull or read one chunk, open
//! one transaction, do the chunk's work, commit, fold the outcome into the
//! controller. Retriable failures re-attempt the same chunk after a
//! cooldown; fatal failures abort with everything already committed left
//! in place. No two generations of one operation ever overlap.

mod export;
mod fold;
mod write;

pub use export::export;
pub use fold::{aggregate, for_each, for_each_fold};
pub use write::{insert, write, write_with_progress};

use crate::context::GenerationContext;
use crate::controller::{BatchController, GenerationOutcome};
use crate::{BulkConfig, BulkError};
use sluice_sequence::{SequenceIter, take_chunk};
use sluice_store::StoreTransaction;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Await `fut`, surfacing `Cancelled` promptly if the token fires first.
pub(crate) async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, BulkError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BulkError::Cancelled),
        out = fut => Ok(out),
    }
}

/// Assemble the next generation's chunk: elements pushed back by a failed
/// attempt first, then fresh pulls from the source.
///
/// A failed generation returns its elements to `pending` and the next
/// attempt re-takes them under the shrunken step, so a chunk that was too
/// large for one transaction is re-attempted in smaller pieces with no
/// element skipped or duplicated.
pub(crate) async fn next_chunk<T>(
    pending: &mut VecDeque<T>,
    iter: &mut dyn SequenceIter<T>,
    step: usize,
    cancel: &CancellationToken,
) -> Result<Vec<T>, BulkError> {
    let mut chunk = Vec::with_capacity(step.min(1024));
    while chunk.len() < step {
        match pending.pop_front() {
            Some(item) => chunk.push(item),
            None => break,
        }
    }
    if chunk.len() < step {
        chunk.extend(take_chunk(iter, step - chunk.len(), cancel).await?);
    }
    Ok(chunk)
}

/// Return a failed chunk to the front of `pending`, preserving order.
pub(crate) fn push_back_chunk<T>(pending: &mut VecDeque<T>, chunk: Vec<T>) {
    for item in chunk.into_iter().rev() {
        pending.push_front(item);
    }
}

/// Bookkeeping shared by every generation loop: the controller plus the
/// operation-wide position and generation counters.
pub(crate) struct GenerationDriver {
    controller: BatchController,
    op_start: Instant,
    position: u64,
    generation: u64,
}

impl GenerationDriver {
    pub(crate) fn new(config: &BulkConfig) -> Self {
        Self {
            controller: BatchController::new(config),
            op_start: Instant::now(),
            position: 0,
            generation: 0,
        }
    }

    pub(crate) fn step(&self) -> usize {
        self.controller.step()
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn context(
        &self,
        txn: Arc<dyn StoreTransaction>,
        gen_start: Instant,
    ) -> GenerationContext {
        GenerationContext::new(
            self.position,
            self.generation,
            self.controller.step(),
            self.controller.cooldown(),
            gen_start.elapsed(),
            self.op_start.elapsed(),
            txn,
        )
    }

    /// Record a committed generation of `count` elements.
    pub(crate) fn complete_generation(&mut self, count: usize, elapsed: Duration) {
        self.controller
            .observe(GenerationOutcome::Success { elapsed });
        self.position += count as u64;
        tracing::debug!(
            generation = self.generation,
            count,
            position = self.position,
            elapsed_ms = elapsed.as_millis() as u64,
            next_step = self.controller.step(),
            "generation committed"
        );
        self.generation += 1;
    }

    /// Record a retriable failure and sleep the cooldown. Converts to a
    /// fatal error once the retry ceiling is exhausted.
    pub(crate) async fn retry_generation(
        &mut self,
        error: &str,
        cancel: &CancellationToken,
    ) -> Result<(), BulkError> {
        let decision = self.controller.observe(GenerationOutcome::Retriable);
        let attempts = self.controller.consecutive_failures();
        if !decision.should_retry {
            tracing::error!(
                generation = self.generation,
                attempts,
                error,
                "generation retries exhausted"
            );
            return Err(BulkError::Fatal(format!(
                "retries exhausted after {attempts} failed attempts: {error}"
            )));
        }
        tracing::debug!(
            generation = self.generation,
            attempts,
            error,
            cooldown_ms = decision.cooldown.as_millis() as u64,
            next_step = decision.next_step,
            "generation failed, backing off"
        );
        if !decision.cooldown.is_zero() {
            with_cancel(cancel, tokio::time::sleep(decision.cooldown)).await?;
        }
        Ok(())
    }
}
