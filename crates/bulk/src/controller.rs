//! Adaptive step-size control.
//!
//! The decision logic is a pure function from the previous generation's
//! outcome to the next step, the cooldown to apply, and whether a failed
//! generation should be re-attempted. [`BatchController`] is a thin
//! stateful wrapper tracking the current step, cooldown and consecutive
//! failure count across a bulk operation.

use crate::config::BulkConfig;
use std::time::Duration;

/// Outcome of one generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// The generation committed; `elapsed` is the attempt's wall time,
    /// including any caller callback and sink latency inside it.
    Success { elapsed: Duration },
    /// The attempt failed with a transient error.
    Retriable,
}

/// Controller verdict for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Target element count for the next generation.
    pub next_step: usize,
    /// Backoff to wait before the next attempt.
    pub cooldown: Duration,
    /// After a failure: whether the generation may be re-attempted.
    /// Always `false` after a success.
    pub should_retry: bool,
}

/// Pure decision function.
///
/// `consecutive_failures` counts the failed attempts of the current
/// generation *before* this outcome.
pub fn decide(
    config: &BulkConfig,
    step: usize,
    cooldown: Duration,
    consecutive_failures: u32,
    outcome: GenerationOutcome,
) -> Decision {
    let floor = config.min_step.max(1);
    match outcome {
        GenerationOutcome::Success { elapsed } => {
            let next_step = if elapsed > config.generation_budget {
                // too ambitious: a slow generation means the chunk has to
                // shrink even though it committed
                (step / 2).max(floor)
            } else {
                step.saturating_mul(config.growth_factor.max(1) as usize)
                    .min(config.max_step)
            };
            Decision {
                next_step,
                cooldown: config.cooldown_floor,
                should_retry: false,
            }
        }
        GenerationOutcome::Retriable => {
            let next_step = (step / 2).max(floor);
            let initial = config.cooldown_initial.min(config.cooldown_ceiling);
            let cooldown = cooldown
                .saturating_mul(2)
                .clamp(initial, config.cooldown_ceiling);
            Decision {
                next_step,
                cooldown,
                should_retry: consecutive_failures < config.max_retries,
            }
        }
    }
}

/// Stateful wrapper over [`decide`] used by the generation loops.
#[derive(Debug, Clone)]
pub struct BatchController {
    config: BulkConfig,
    step: usize,
    cooldown: Duration,
    consecutive_failures: u32,
}

impl BatchController {
    pub fn new(config: &BulkConfig) -> Self {
        let floor = config.min_step.max(1);
        Self {
            config: config.clone(),
            step: config.initial_step.clamp(floor, config.max_step.max(floor)),
            cooldown: config.cooldown_floor,
            consecutive_failures: 0,
        }
    }

    /// Target element count for the current generation.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Backoff applied before the current attempt.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Failed attempts of the current generation so far.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Fold an outcome into the controller state.
    pub fn observe(&mut self, outcome: GenerationOutcome) -> Decision {
        let decision = decide(
            &self.config,
            self.step,
            self.cooldown,
            self.consecutive_failures,
            outcome,
        );
        self.step = decision.next_step;
        self.cooldown = decision.cooldown;
        self.consecutive_failures = match outcome {
            GenerationOutcome::Success { .. } => 0,
            GenerationOutcome::Retriable => self.consecutive_failures + 1,
        };
        decision
    }
}
