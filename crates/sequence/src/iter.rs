//! The lazy pull contract: sequences, open iterators, fetch modes.

use crate::{Result, SequenceError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Hint from a consumer to a producer about how many elements it expects to
/// pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// No particular expectation.
    #[default]
    Default,
    /// At most one element will be pulled; the producer may optimize for a
    /// small first batch.
    Head,
    /// The whole sequence will likely be consumed; head-only optimizations
    /// must be disabled.
    Iterator,
}

/// Lifecycle of an open iterator.
///
/// `Completed` means the sequence ended normally (further `advance` calls
/// return `false`); `Disposed` means resources were released and further
/// `advance` calls are a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IterState {
    Unstarted,
    Active,
    Completed,
    Disposed,
}

/// A lazy, forward-only sequence of `T`.
///
/// A sequence is a reusable factory: every [`open`](Sequence::open) returns
/// an independent iterator positioned before the first element.
pub trait Sequence<T>: Send + Sync {
    /// Open an iterator over the sequence.
    fn open(&self, mode: FetchMode) -> Result<Box<dyn SequenceIter<T>>>;
}

/// An open iterator over a sequence.
///
/// Owns at most one upstream iterator at a time; disposing the owner
/// disposes the upstream. Iterators are always disposed on drop, but error
/// handling is better served by calling [`dispose`](SequenceIter::dispose)
/// explicitly on the exit path.
#[async_trait]
pub trait SequenceIter<T>: Send {
    /// Move to the next element. `Ok(true)` means an element is available
    /// through [`current`](SequenceIter::current) /
    /// [`take_current`](SequenceIter::take_current); `Ok(false)` means the
    /// sequence is exhausted.
    ///
    /// Observes `cancel` cooperatively and returns
    /// [`SequenceError::Cancelled`] promptly; cancellation does not dispose
    /// the iterator, the caller still owns that.
    async fn advance(&mut self, cancel: &CancellationToken) -> Result<bool>;

    /// Borrow the current element; `None` unless the last `advance`
    /// returned `true`.
    fn current(&self) -> Option<&T>;

    /// Move the current element out, leaving the iterator positioned but
    /// empty until the next `advance`.
    fn take_current(&mut self) -> Option<T>;

    /// Release held resources, including the upstream chain. Idempotent.
    fn dispose(&mut self);
}

impl<T, S: Sequence<T> + ?Sized> Sequence<T> for std::sync::Arc<S> {
    fn open(&self, mode: FetchMode) -> Result<Box<dyn SequenceIter<T>>> {
        (**self).open(mode)
    }
}

/// Pull up to `max` elements into an ordered chunk. A short or empty chunk
/// means the sequence is exhausted.
pub async fn take_chunk<T>(
    iter: &mut dyn SequenceIter<T>,
    max: usize,
    cancel: &CancellationToken,
) -> Result<Vec<T>> {
    let mut chunk = Vec::with_capacity(max.min(1024));
    while chunk.len() < max {
        if !iter.advance(cancel).await? {
            break;
        }
        match iter.take_current() {
            Some(item) => chunk.push(item),
            None => {
                return Err(SequenceError::Source(
                    "iterator advanced without an element".to_string(),
                ));
            }
        }
    }
    Ok(chunk)
}
