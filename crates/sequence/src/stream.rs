//! Bridge from an open sequence iterator to a `futures::Stream`.

use crate::Result;
use crate::iter::SequenceIter;
use futures::Stream;
use futures::stream;
use tokio_util::sync::CancellationToken;

/// Adapt an open iterator into a `Stream` of results.
///
/// The iterator is disposed when the stream reaches its end or yields an
/// error; dropping the stream mid-way also releases it (via the iterator's
/// own drop-disposal).
pub fn into_stream<T: Send + 'static>(
    iter: Box<dyn SequenceIter<T>>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<T>> {
    stream::unfold(Some((iter, cancel)), |state| async move {
        let (mut iter, cancel) = state?;
        match iter.advance(&cancel).await {
            Ok(true) => match iter.take_current() {
                Some(item) => Some((Ok(item), Some((iter, cancel)))),
                None => {
                    iter.dispose();
                    None
                }
            },
            Ok(false) => {
                iter.dispose();
                None
            }
            Err(err) => {
                iter.dispose();
                Some((Err(err), None))
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::{FetchMode, Sequence};
    use crate::source::from_vec;
    use crate::stage::SequenceExt;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_stream_yields_all_elements() {
        let seq = from_vec(vec![1, 2, 3]).map(|n| n * 2);
        let iter = seq.open(FetchMode::Iterator).unwrap();
        let stream = into_stream(iter, CancellationToken::new());
        tokio::pin!(stream);

        let mut seen = Vec::new();
        while let Some(item) = stream.next().await {
            seen.push(item.unwrap());
        }
        assert_eq!(seen, vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn test_stream_ends_after_cancellation_error() {
        let seq = from_vec(vec![1, 2, 3]);
        let iter = seq.open(FetchMode::Iterator).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stream = into_stream(iter, cancel);
        tokio::pin!(stream);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }
}
