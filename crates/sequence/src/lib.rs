//! Lazy asynchronous sequences
//!
//! A [`Sequence`] is a factory for pull-based, cancellable iterators over a
//! possibly unbounded element stream. Stages composed on top of a sequence
//! ([`map`], [`filter`], [`take`], [`skip`]) form a single-owner chain: each
//! stage holds exactly one upstream iterator and is responsible for
//! disposing it on every exit path.
//!
//! Consumers announce how much of a sequence they expect to pull through a
//! [`FetchMode`] hint; a cardinality-changing stage upgrades `Head` to
//! `Iterator` before its source is opened, since producing one output may
//! consume many inputs.

pub mod iter;
pub mod source;
pub mod stage;
pub mod stream;
pub mod terminal;

pub use iter::{FetchMode, Sequence, SequenceIter, take_chunk};
pub use source::{VecSource, from_iter, from_vec};
pub use stage::{SequenceExt, StageLogic, StageOutcome, StageSequence, filter, map, skip, take};
pub use stream::into_stream;
pub use terminal::{collect_vec, count, first};

use thiserror::Error;

/// Errors surfaced by sequences and their stages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// The sequence failed to open its source.
    #[error("failed to open source: {0}")]
    Initialization(String),

    /// Failure while pulling from an already-open source.
    #[error("source failure: {0}")]
    Source(String),

    /// Contract misuse, e.g. advancing a disposed iterator.
    #[error("invalid iterator state: {0}")]
    InvalidState(String),

    /// Cooperative cancellation was observed.
    #[error("cancelled")]
    Cancelled,
}

/// Result type for sequence operations.
pub type Result<T> = std::result::Result<T, SequenceError>;
