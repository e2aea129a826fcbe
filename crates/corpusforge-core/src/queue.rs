//! Tagged queue item protocol for bounded channels between pipeline tasks.
//!
//! Every channel in corpusforge carries [`QueueItem<T>`] rather than a bare
//! `T`, so that end-of-stream is a type-level variant instead of an
//! overloaded value (the string `"done"` in the original implementation this
//! pipeline replaces). A worker cannot mistake a payload for a sentinel.

use tokio::sync::mpsc;

/// An item flowing through a bounded queue: either a payload or the
/// end-of-stream marker.
///
/// Readers send exactly `n_workers` [`QueueItem::Sentinel`] values once the
/// source is exhausted, one per downstream worker, so that each worker can
/// independently observe completion and forward its own sentinel downstream.
#[derive(Debug, Clone)]
pub enum QueueItem<T> {
    /// A single unit of work: a raw record, an extracted chunk, an
    /// embedding, or an indexing request pair, depending on the stage.
    Payload(T),
    /// End-of-stream marker. Never carries data.
    Sentinel,
}

impl<T> QueueItem<T> {
    /// Returns the payload, or `None` if this item is the sentinel.
    pub fn into_payload(self) -> Option<T> {
        match self {
            QueueItem::Payload(v) => Some(v),
            QueueItem::Sentinel => None,
        }
    }

    /// True if this item is the end-of-stream sentinel.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, QueueItem::Sentinel)
    }
}

/// Sender half of a bounded queue carrying [`QueueItem<T>`].
pub type QueueTx<T> = mpsc::Sender<QueueItem<T>>;

/// Receiver half of a bounded queue carrying [`QueueItem<T>`].
pub type QueueRx<T> = mpsc::Receiver<QueueItem<T>>;

/// Creates a bounded queue of the given capacity.
pub fn bounded<T>(capacity: usize) -> (QueueTx<T>, QueueRx<T>) {
    mpsc::channel(capacity)
}

/// Sends `count` sentinels on `tx`, one per downstream worker. Best-effort:
/// a closed channel here means every worker has already exited, so the send
/// error is ignored rather than propagated.
pub async fn send_sentinels<T>(tx: &QueueTx<T>, count: usize) {
    for _ in 0..count {
        let _ = tx.send(QueueItem::Sentinel).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip() {
        let item = QueueItem::Payload(42);
        assert!(!item.is_sentinel());
        assert_eq!(item.into_payload(), Some(42));
    }

    #[test]
    fn sentinel_has_no_payload() {
        let item: QueueItem<i32> = QueueItem::Sentinel;
        assert!(item.is_sentinel());
        assert_eq!(item.into_payload(), None);
    }

    #[tokio::test]
    async fn send_sentinels_delivers_one_per_worker() {
        let (tx, mut rx) = bounded::<i32>(4);
        send_sentinels(&tx, 3).await;
        drop(tx);
        let mut seen = 0;
        while let Some(item) = rx.recv().await {
            assert!(item.is_sentinel());
            seen += 1;
        }
        assert_eq!(seen, 3);
    }
}
