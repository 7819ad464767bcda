//! In-memory sequence sources.

use crate::iter::{FetchMode, IterState, Sequence, SequenceIter};
use crate::{Result, SequenceError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Sequence over an in-memory collection. Cheap to clone; every `open`
/// yields an independent pass over the same elements.
pub struct VecSource<T> {
    items: Arc<Vec<T>>,
}

impl<T> Clone for VecSource<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// Sequence over the elements of `items`.
pub fn from_vec<T>(items: Vec<T>) -> VecSource<T> {
    VecSource {
        items: Arc::new(items),
    }
}

/// Sequence over the elements produced by `iter`, collected eagerly.
pub fn from_iter<T>(iter: impl IntoIterator<Item = T>) -> VecSource<T> {
    from_vec(iter.into_iter().collect())
}

impl<T: Clone + Send + Sync + 'static> Sequence<T> for VecSource<T> {
    fn open(&self, _mode: FetchMode) -> Result<Box<dyn SequenceIter<T>>> {
        Ok(Box::new(VecIter {
            items: self.items.clone(),
            pos: 0,
            slot: None,
            state: IterState::Unstarted,
        }))
    }
}

struct VecIter<T> {
    items: Arc<Vec<T>>,
    pos: usize,
    slot: Option<T>,
    state: IterState,
}

impl<T> VecIter<T> {
    fn release(&mut self) {
        self.slot = None;
        self.state = IterState::Disposed;
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> SequenceIter<T> for VecIter<T> {
    async fn advance(&mut self, cancel: &CancellationToken) -> Result<bool> {
        match self.state {
            IterState::Disposed => {
                return Err(SequenceError::InvalidState(
                    "advance on a disposed iterator".to_string(),
                ));
            }
            IterState::Completed => return Ok(false),
            IterState::Unstarted | IterState::Active => {}
        }
        if cancel.is_cancelled() {
            return Err(SequenceError::Cancelled);
        }

        self.state = IterState::Active;
        match self.items.get(self.pos) {
            Some(item) => {
                self.slot = Some(item.clone());
                self.pos += 1;
                Ok(true)
            }
            None => {
                self.slot = None;
                self.state = IterState::Completed;
                Ok(false)
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

impl<T> Drop for VecIter<T> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yields_in_order() {
        let source = from_vec(vec![1, 2, 3]);
        let cancel = CancellationToken::new();
        let mut iter = source.open(FetchMode::Default).unwrap();

        let mut seen = Vec::new();
        while iter.advance(&cancel).await.unwrap() {
            seen.push(iter.take_current().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);

        // exhausted iterators keep reporting completion
        assert!(!iter.advance(&cancel).await.unwrap());
    }

    #[tokio::test]
    async fn test_opens_are_independent() {
        let source = from_iter(0..3);
        let cancel = CancellationToken::new();

        let mut a = source.open(FetchMode::Default).unwrap();
        let mut b = source.open(FetchMode::Default).unwrap();
        assert!(a.advance(&cancel).await.unwrap());
        assert!(a.advance(&cancel).await.unwrap());
        assert!(b.advance(&cancel).await.unwrap());
        assert_eq!(a.current(), Some(&1));
        assert_eq!(b.current(), Some(&0));
    }

    #[tokio::test]
    async fn test_cancellation_does_not_dispose() {
        let source = from_vec(vec![1, 2, 3]);
        let cancel = CancellationToken::new();
        let mut iter = source.open(FetchMode::Default).unwrap();
        assert!(iter.advance(&cancel).await.unwrap());

        cancel.cancel();
        assert_eq!(
            iter.advance(&cancel).await.unwrap_err(),
            SequenceError::Cancelled
        );

        // a fresh token can resume the same iterator
        let fresh = CancellationToken::new();
        assert!(iter.advance(&fresh).await.unwrap());
        assert_eq!(iter.current(), Some(&2));
    }

    #[tokio::test]
    async fn test_advance_after_dispose_is_invalid() {
        let source = from_vec(vec![1]);
        let cancel = CancellationToken::new();
        let mut iter = source.open(FetchMode::Default).unwrap();
        iter.dispose();
        iter.dispose(); // idempotent

        assert!(matches!(
            iter.advance(&cancel).await,
            Err(SequenceError::InvalidState(_))
        ));
    }
}
