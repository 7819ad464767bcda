//! Per-generation context handed to processing callbacks.

use sluice_store::StoreTransaction;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of one generation's place in a bulk operation.
///
/// Constructed fresh per generation, right after its transaction opens, and
/// moved into the processing callback; the engine never reuses a context
/// across generations. A retried attempt gets a new context with the same
/// `position` and `generation` ordinal.
#[derive(Clone)]
pub struct GenerationContext {
    position: u64,
    generation: u64,
    step: usize,
    cooldown: Duration,
    elapsed_generation: Duration,
    elapsed_total: Duration,
    txn: Arc<dyn StoreTransaction>,
}

impl GenerationContext {
    pub(crate) fn new(
        position: u64,
        generation: u64,
        step: usize,
        cooldown: Duration,
        elapsed_generation: Duration,
        elapsed_total: Duration,
        txn: Arc<dyn StoreTransaction>,
    ) -> Self {
        Self {
            position,
            generation,
            step,
            cooldown,
            elapsed_generation,
            elapsed_total,
            txn,
        }
    }

    /// Elements processed by all prior generations (their actual counts,
    /// not their targets).
    pub fn position(&self) -> u64 {
        self.position
    }

    /// 0-based ordinal of this generation. Retried attempts keep theirs.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Target element count for this generation.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Backoff delay that preceded this attempt.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Wall time since this generation's transaction opened.
    pub fn elapsed_generation(&self) -> Duration {
        self.elapsed_generation
    }

    /// Wall time since the operation started.
    pub fn elapsed_total(&self) -> Duration {
        self.elapsed_total
    }

    /// The transaction backing this generation. Committed or rolled back by
    /// the engine after the callback returns; never reused.
    pub fn transaction(&self) -> &dyn StoreTransaction {
        self.txn.as_ref()
    }
}

impl fmt::Debug for GenerationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("position", &self.position)
            .field("generation", &self.generation)
            .field("step", &self.step)
            .field("cooldown", &self.cooldown)
            .field("elapsed_generation", &self.elapsed_generation)
            .field("elapsed_total", &self.elapsed_total)
            .finish_non_exhaustive()
    }
}
