//! Terminal operations that drain a sequence.
//!
//! Each terminal opens its own iterator, announces the appropriate fetch
//! mode, and disposes the iterator on every exit path before returning.

use crate::Result;
use crate::iter::{FetchMode, Sequence};
use tokio_util::sync::CancellationToken;

/// First element of the sequence, if any. Opens in `Head` mode so sources
/// may optimize for a single pull.
pub async fn first<T>(seq: &dyn Sequence<T>, cancel: &CancellationToken) -> Result<Option<T>> {
    let mut iter = seq.open(FetchMode::Head)?;
    let result = match iter.advance(cancel).await {
        Ok(true) => Ok(iter.take_current()),
        Ok(false) => Ok(None),
        Err(err) => Err(err),
    };
    iter.dispose();
    result
}

/// Drain the sequence into a `Vec`, in order.
pub async fn collect_vec<T>(seq: &dyn Sequence<T>, cancel: &CancellationToken) -> Result<Vec<T>> {
    let mut iter = seq.open(FetchMode::Iterator)?;
    let mut items = Vec::new();
    let result = loop {
        match iter.advance(cancel).await {
            Ok(true) => match iter.take_current() {
                Some(item) => items.push(item),
                None => break Ok(items),
            },
            Ok(false) => break Ok(items),
            Err(err) => break Err(err),
        }
    };
    iter.dispose();
    result
}

/// Number of elements in the sequence.
pub async fn count<T>(seq: &dyn Sequence<T>, cancel: &CancellationToken) -> Result<u64> {
    let mut iter = seq.open(FetchMode::Iterator)?;
    let mut n = 0u64;
    let result = loop {
        match iter.advance(cancel).await {
            Ok(true) => n += 1,
            Ok(false) => break Ok(n),
            Err(err) => break Err(err),
        }
    };
    iter.dispose();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SequenceError;
    use crate::iter::SequenceIter;
    use crate::source::from_vec;
    use crate::stage::SequenceExt;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Source that records the fetch mode of every open.
    struct ProbeSource {
        modes: Arc<Mutex<Vec<FetchMode>>>,
        items: Vec<i32>,
    }

    impl Sequence<i32> for ProbeSource {
        fn open(&self, mode: FetchMode) -> Result<Box<dyn SequenceIter<i32>>> {
            self.modes.lock().push(mode);
            from_vec(self.items.clone()).open(mode)
        }
    }

    /// Sequence whose open always fails.
    struct BrokenSource;

    impl Sequence<i32> for BrokenSource {
        fn open(&self, _mode: FetchMode) -> Result<Box<dyn SequenceIter<i32>>> {
            Err(SequenceError::Initialization("no backing data".to_string()))
        }
    }

    #[tokio::test]
    async fn test_first_uses_head_mode() {
        let modes = Arc::new(Mutex::new(Vec::new()));
        let probe = ProbeSource {
            modes: modes.clone(),
            items: vec![7, 8, 9],
        };

        let cancel = CancellationToken::new();
        assert_eq!(first(&probe, &cancel).await.unwrap(), Some(7));
        assert_eq!(*modes.lock(), vec![FetchMode::Head]);
    }

    #[tokio::test]
    async fn test_stage_upgrades_head_to_iterator() {
        let modes = Arc::new(Mutex::new(Vec::new()));
        let probe = ProbeSource {
            modes: modes.clone(),
            items: vec![1, 2, 3, 4],
        };

        // a filter may need many source elements to produce one output, so
        // the source must not see the Head hint
        let filtered = filter_stage(probe);
        let cancel = CancellationToken::new();
        assert_eq!(first(&filtered, &cancel).await.unwrap(), Some(4));
        assert_eq!(*modes.lock(), vec![FetchMode::Iterator]);
    }

    fn filter_stage(probe: ProbeSource) -> impl Sequence<i32> {
        probe.filter(|n| n % 4 == 0)
    }

    #[tokio::test]
    async fn test_failed_source_open_surfaces_initialization() {
        let staged = filter_broken();
        let cancel = CancellationToken::new();
        assert!(matches!(
            collect_vec(&staged, &cancel).await,
            Err(SequenceError::Initialization(_))
        ));
    }

    fn filter_broken() -> impl Sequence<i32> {
        BrokenSource.filter(|_| true)
    }

    #[tokio::test]
    async fn test_collect_and_count() {
        let seq = from_vec(vec![1, 2, 3]).map(|n| n * n);
        let cancel = CancellationToken::new();
        assert_eq!(collect_vec(&seq, &cancel).await.unwrap(), vec![1, 4, 9]);
        assert_eq!(count(&seq, &cancel).await.unwrap(), 3);
        assert_eq!(first(&seq, &cancel).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_empty_sequence() {
        let seq = from_vec(Vec::<i32>::new());
        let cancel = CancellationToken::new();
        assert_eq!(first(&seq, &cancel).await.unwrap(), None);
        assert_eq!(count(&seq, &cancel).await.unwrap(), 0);
    }
}
