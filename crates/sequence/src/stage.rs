//! Composable filter/transform stages.
//!
//! Every combinator is a small [`StageLogic`] plugged into one shared base
//! iterator that owns the hard parts: upgrading `Head` to `Iterator` before
//! the source is opened, and disposing the source exactly once on every
//! exit path.

use crate::iter::{FetchMode, IterState, Sequence, SequenceIter};
use crate::{Result, SequenceError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What one source element contributes to the stage's output.
pub enum StageOutcome<T> {
    /// Emit this element.
    Yield(T),
    /// Drop it and keep pulling from the source.
    Skip,
    /// End the sequence; remaining source elements are never pulled.
    Stop,
}

/// Per-element behavior of a stage. A fresh instance is built for every
/// open iterator, so logics may carry mutable state (counters, etc.).
pub trait StageLogic<S, T>: Send {
    fn apply(&mut self, item: S) -> StageOutcome<T>;
}

type LogicFactory<S, T> = Arc<dyn Fn() -> Box<dyn StageLogic<S, T>> + Send + Sync>;

/// A sequence produced by composing a stage over a source sequence.
pub struct StageSequence<S, T> {
    source: Arc<dyn Sequence<S>>,
    logic: LogicFactory<S, T>,
}

impl<S, T> Clone for StageSequence<S, T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            logic: self.logic.clone(),
        }
    }
}

impl<S: Send + 'static, T: Send + 'static> Sequence<T> for StageSequence<S, T> {
    fn open(&self, mode: FetchMode) -> Result<Box<dyn SequenceIter<T>>> {
        Ok(Box::new(StageIter {
            source_seq: self.source.clone(),
            mode,
            source: None,
            logic: (self.logic)(),
            slot: None,
            state: IterState::Unstarted,
        }))
    }
}

/// Base iterator shared by all stages.
///
/// The source sequence is opened lazily on the first `advance`, with `Head`
/// upgraded to `Iterator`: a stage may consume many source elements to
/// produce one output, so letting a head-only optimization through could
/// starve it.
struct StageIter<S, T> {
    source_seq: Arc<dyn Sequence<S>>,
    mode: FetchMode,
    source: Option<Box<dyn SequenceIter<S>>>,
    logic: Box<dyn StageLogic<S, T>>,
    slot: Option<T>,
    state: IterState,
}

impl<S, T> StageIter<S, T> {
    fn open_source(&mut self) -> Result<()> {
        let mode = match self.mode {
            FetchMode::Head => FetchMode::Iterator,
            other => other,
        };
        match self.source_seq.open(mode) {
            Ok(iter) => {
                self.source = Some(iter);
                self.state = IterState::Active;
                Ok(())
            }
            Err(SequenceError::Initialization(reason)) => {
                self.state = IterState::Completed;
                Err(SequenceError::Initialization(reason))
            }
            Err(other) => {
                self.state = IterState::Completed;
                Err(SequenceError::Initialization(other.to_string()))
            }
        }
    }

    /// End of sequence (normal or failed): release the source early, keep
    /// the iterator usable for further (false-returning) advances.
    fn complete(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.dispose();
        }
        self.slot = None;
        self.state = IterState::Completed;
    }

    fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.dispose();
        }
        self.slot = None;
        self.state = IterState::Disposed;
    }
}

#[async_trait]
impl<S: Send, T: Send> SequenceIter<T> for StageIter<S, T> {
    async fn advance(&mut self, cancel: &CancellationToken) -> Result<bool> {
        match self.state {
            IterState::Disposed => {
                return Err(SequenceError::InvalidState(
                    "advance on a disposed iterator".to_string(),
                ));
            }
            IterState::Completed => return Ok(false),
            IterState::Unstarted => self.open_source()?,
            IterState::Active => {}
        }

        self.slot = None;

        enum Pull<S> {
            Item(S),
            End,
            Failed(SequenceError),
        }

        loop {
            let pull = {
                let Some(source) = self.source.as_mut() else {
                    return Err(SequenceError::InvalidState(
                        "active stage lost its source iterator".to_string(),
                    ));
                };
                match source.advance(cancel).await {
                    Ok(true) => match source.take_current() {
                        Some(item) => Pull::Item(item),
                        None => Pull::Failed(SequenceError::Source(
                            "source advanced without an element".to_string(),
                        )),
                    },
                    Ok(false) => Pull::End,
                    Err(err) => Pull::Failed(err),
                }
            };

            match pull {
                Pull::Item(item) => match self.logic.apply(item) {
                    StageOutcome::Yield(out) => {
                        self.slot = Some(out);
                        return Ok(true);
                    }
                    StageOutcome::Skip => continue,
                    StageOutcome::Stop => {
                        self.complete();
                        return Ok(false);
                    }
                },
                Pull::End => {
                    self.complete();
                    return Ok(false);
                }
                // cancellation is not failure; the chain stays intact so the
                // caller can resume or dispose explicitly
                Pull::Failed(SequenceError::Cancelled) => return Err(SequenceError::Cancelled),
                Pull::Failed(err) => {
                    self.complete();
                    return Err(err);
                }
            }
        }
    }

    fn current(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    fn take_current(&mut self) -> Option<T> {
        self.slot.take()
    }

    fn dispose(&mut self) {
        self.release();
    }
}

impl<S, T> Drop for StageIter<S, T> {
    fn drop(&mut self) {
        self.release();
    }
}

struct MapLogic<F> {
    f: Arc<F>,
}

impl<S, T, F: Fn(S) -> T + Send + Sync> StageLogic<S, T> for MapLogic<F> {
    fn apply(&mut self, item: S) -> StageOutcome<T> {
        StageOutcome::Yield((self.f)(item))
    }
}

struct FilterLogic<F> {
    predicate: Arc<F>,
}

impl<T, F: Fn(&T) -> bool + Send + Sync> StageLogic<T, T> for FilterLogic<F> {
    fn apply(&mut self, item: T) -> StageOutcome<T> {
        if (self.predicate)(&item) {
            StageOutcome::Yield(item)
        } else {
            StageOutcome::Skip
        }
    }
}

struct TakeLogic {
    remaining: usize,
}

impl<T: Send> StageLogic<T, T> for TakeLogic {
    fn apply(&mut self, item: T) -> StageOutcome<T> {
        if self.remaining == 0 {
            StageOutcome::Stop
        } else {
            self.remaining -= 1;
            StageOutcome::Yield(item)
        }
    }
}

struct SkipLogic {
    remaining: usize,
}

impl<T: Send> StageLogic<T, T> for SkipLogic {
    fn apply(&mut self, item: T) -> StageOutcome<T> {
        if self.remaining > 0 {
            self.remaining -= 1;
            StageOutcome::Skip
        } else {
            StageOutcome::Yield(item)
        }
    }
}

/// Transform every element of `source` through `f`.
pub fn map<S, T, F>(source: Arc<dyn Sequence<S>>, f: F) -> StageSequence<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: Fn(S) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    StageSequence {
        source,
        logic: Arc::new(move || Box::new(MapLogic { f: f.clone() }) as Box<dyn StageLogic<S, T>>),
    }
}

/// Keep only the elements of `source` matching `predicate`.
pub fn filter<T, F>(source: Arc<dyn Sequence<T>>, predicate: F) -> StageSequence<T, T>
where
    T: Send + 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    StageSequence {
        source,
        logic: Arc::new(move || {
            Box::new(FilterLogic {
                predicate: predicate.clone(),
            }) as Box<dyn StageLogic<T, T>>
        }),
    }
}

/// The first `n` elements of `source`; the source is never pulled past them.
pub fn take<T: Send + 'static>(source: Arc<dyn Sequence<T>>, n: usize) -> StageSequence<T, T> {
    StageSequence {
        source,
        logic: Arc::new(move || Box::new(TakeLogic { remaining: n }) as Box<dyn StageLogic<T, T>>),
    }
}

/// Everything after the first `n` elements of `source`.
pub fn skip<T: Send + 'static>(source: Arc<dyn Sequence<T>>, n: usize) -> StageSequence<T, T> {
    StageSequence {
        source,
        logic: Arc::new(move || Box::new(SkipLogic { remaining: n }) as Box<dyn StageLogic<T, T>>),
    }
}

/// Fluent composition over any sequence.
pub trait SequenceExt<T: Send + 'static>: Sequence<T> + Sized + 'static {
    fn map<U, F>(self, f: F) -> StageSequence<T, U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        map(Arc::new(self), f)
    }

    fn filter<F>(self, predicate: F) -> StageSequence<T, T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        filter(Arc::new(self), predicate)
    }

    fn take(self, n: usize) -> StageSequence<T, T> {
        take(Arc::new(self), n)
    }

    fn skip(self, n: usize) -> StageSequence<T, T> {
        skip(Arc::new(self), n)
    }
}

impl<T: Send + 'static, S: Sequence<T> + Sized + 'static> SequenceExt<T> for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::from_vec;
    use crate::terminal::collect_vec;

    #[tokio::test]
    async fn test_composed_stages() {
        let seq = from_vec((1..=10).collect::<Vec<i32>>())
            .filter(|n| n % 2 == 0)
            .map(|n| n * 10)
            .skip(1)
            .take(3);

        let cancel = CancellationToken::new();
        let items = collect_vec(&seq, &cancel).await.unwrap();
        assert_eq!(items, vec![40, 60, 80]);
    }

    #[tokio::test]
    async fn test_take_stops_pulling_source() {
        let seq = from_vec((0..100).collect::<Vec<i32>>()).take(2);
        let cancel = CancellationToken::new();
        let mut iter = seq.open(FetchMode::Default).unwrap();

        assert!(iter.advance(&cancel).await.unwrap());
        assert!(iter.advance(&cancel).await.unwrap());
        assert!(!iter.advance(&cancel).await.unwrap());
        // completed, not disposed: advancing again is still legal
        assert!(!iter.advance(&cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_dispose_then_advance_is_invalid() {
        let seq = from_vec(vec![1, 2, 3]).map(|n| n + 1);
        let cancel = CancellationToken::new();
        let mut iter = seq.open(FetchMode::Default).unwrap();
        assert!(iter.advance(&cancel).await.unwrap());

        iter.dispose();
        iter.dispose();
        assert!(matches!(
            iter.advance(&cancel).await,
            Err(SequenceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_cancellation_leaves_stage_resumable() {
        let seq = from_vec(vec![1, 2, 3]).map(|n| n * 2);
        let cancel = CancellationToken::new();
        let mut iter = seq.open(FetchMode::Default).unwrap();
        assert!(iter.advance(&cancel).await.unwrap());

        cancel.cancel();
        assert_eq!(
            iter.advance(&cancel).await.unwrap_err(),
            SequenceError::Cancelled
        );

        let fresh = CancellationToken::new();
        assert!(iter.advance(&fresh).await.unwrap());
        assert_eq!(iter.take_current(), Some(4));
    }
}
