//! Controller configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the adaptive batch controller.
///
/// Passed explicitly into every bulk operation; there is no global state.
/// [`Default`] gives moderate values suitable for stores with transaction
/// budgets in the few-seconds / few-megabytes class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Element count targeted by the first generation.
    pub initial_step: usize,

    /// Lower bound for `step` after repeated failures. Clamped to at
    /// least 1.
    pub min_step: usize,

    /// Upper bound for `step` growth.
    pub max_step: usize,

    /// Multiplier applied to `step` after an in-budget success.
    pub growth_factor: u32,

    /// Cooldown resets here after any fully successful generation.
    pub cooldown_floor: Duration,

    /// First non-zero cooldown applied after a failure.
    pub cooldown_initial: Duration,

    /// Upper bound for the cooldown under consecutive failures.
    pub cooldown_ceiling: Duration,

    /// Wall-clock budget one generation should stay under. A successful
    /// generation that overruns it shrinks the next step, which is how a
    /// slow store or a slow export sink back-pressures throughput.
    pub generation_budget: Duration,

    /// Consecutive failed attempts of one generation before the operation
    /// aborts with a fatal error.
    pub max_retries: u32,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            initial_step: 1024,
            min_step: 1,
            max_step: 16 * 1024,
            growth_factor: 2,
            cooldown_floor: Duration::ZERO,
            cooldown_initial: Duration::from_millis(10),
            cooldown_ceiling: Duration::from_secs(5),
            generation_budget: Duration::from_secs(4),
            max_retries: 10,
        }
    }
}
