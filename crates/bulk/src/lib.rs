//! Adaptive bulk operations over a transactional ordered KV store
//!
//! Work larger than one store transaction is split into a strictly
//! sequential run of **generations**, each backed by exactly one
//! transaction. A [`BatchController`] adapts the per-generation element
//! count (`step`) to observed throughput and failure, backing off with a
//! bounded-exponential cooldown on retriable errors and re-attempting the
//! same input range idempotently.
//!
//! The five operations:
//! - [`write`] / [`write_with_progress`]: set precomputed key/value pairs.
//! - [`insert`]: caller derives keys/values per item inside the
//!   generation's transaction.
//! - [`for_each`] / [`for_each_fold`]: chunked reads folding caller state
//!   across generations.
//! - [`aggregate`]: fold plus a final transform.
//! - [`export`]: ordered whole-range scan delivered to a caller sink.

pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod ops;

pub use config::BulkConfig;
pub use context::GenerationContext;
pub use controller::{BatchController, Decision, GenerationOutcome, decide};
pub use error::{BulkError, Result};
pub use ops::{
    aggregate, export, for_each, for_each_fold, insert, write, write_with_progress,
};
