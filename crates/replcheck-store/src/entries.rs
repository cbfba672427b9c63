//! Entry streams: ordered `LDAP_ENTRY` rows handed from a producer task to
//! the comparator.
//!
//! Each stream owns a bounded channel of depth [`ENTRY_CHANNEL_DEPTH`]. The
//! producer runs the query and pushes rows as the consumer pulls them; a
//! closed channel means the query is exhausted. Dropping the stream closes
//! the channel and the producer stops at its next send.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use replcheck_core::DirectoryEntry;
use tokio::sync::mpsc;

use crate::error::{Result, StoreError};

/// Capacity of the hand-off channel between producer and comparator.
pub const ENTRY_CHANNEL_DEPTH: usize = 1;

/// Producer half of an entry stream.
pub struct EntrySender {
    tx: mpsc::Sender<Result<DirectoryEntry>>,
}

impl EntrySender {
    /// Send from async code. Returns false once the stream was dropped.
    pub async fn send(&self, item: Result<DirectoryEntry>) -> bool {
        self.tx.send(item).await.is_ok()
    }

    /// Send from a blocking worker. Returns false once the stream was dropped.
    pub fn blocking_send(&self, item: Result<DirectoryEntry>) -> bool {
        self.tx.blocking_send(item).is_ok()
    }
}

/// Consumer half: a lazy, ordered, single-pass sequence of entries.
pub struct EntryStream {
    rx: mpsc::Receiver<Result<DirectoryEntry>>,
    source: String,
}

/// Create a connected sender/stream pair.
pub fn entry_channel(source: impl Into<String>) -> (EntrySender, EntryStream) {
    let (tx, rx) = mpsc::channel(ENTRY_CHANNEL_DEPTH);
    (
        EntrySender { tx },
        EntryStream {
            rx,
            source: source.into(),
        },
    )
}

impl EntryStream {
    /// Next entry, or `None` when the source is exhausted.
    pub async fn recv(&mut self) -> Option<Result<DirectoryEntry>> {
        self.rx.recv().await
    }

    /// Label of the backing store this stream reads from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// A stream over in-memory entries, fed by a spawned task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_entries(source: impl Into<String>, entries: Vec<DirectoryEntry>) -> Self {
        let (tx, stream) = entry_channel(source);
        tokio::spawn(async move {
            for entry in entries {
                if !tx.send(Ok(entry)).await {
                    break;
                }
            }
        });
        stream
    }

    /// A stream that yields one error and ends.
    pub fn failed(source: impl Into<String>, error: StoreError) -> Self {
        let (tx, stream) = entry_channel(source);
        // Capacity is 1 and the channel is fresh, so this cannot block.
        let _ = tx.tx.try_send(Err(error));
        stream
    }
}

impl Stream for EntryStream {
    type Item = Result<DirectoryEntry>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_from_entries_in_order() {
        let entries = vec![
            DirectoryEntry::new("a", "1"),
            DirectoryEntry::new("b", "2"),
            DirectoryEntry::new("c", "3"),
        ];
        let mut stream = EntryStream::from_entries("mem", entries.clone());

        let mut received = Vec::new();
        while let Some(item) = stream.recv().await {
            received.push(item.unwrap());
        }
        assert_eq!(received, entries);
        assert_eq!(stream.source(), "mem");
    }

    #[tokio::test]
    async fn test_failed_stream() {
        let mut stream = EntryStream::failed(
            "mem",
            StoreError::TableNotFound {
                schema: "S".into(),
                table: "LDAP_ENTRY".into(),
            },
        );
        assert!(matches!(stream.next().await, Some(Err(StoreError::TableNotFound { .. }))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sender_sees_dropped_stream() {
        let (tx, stream) = entry_channel("mem");
        drop(stream);
        assert!(!tx.send(Ok(DirectoryEntry::new("a", "1"))).await);
    }

    #[tokio::test]
    async fn test_channel_is_bounded() {
        let (tx, mut stream) = entry_channel("mem");
        assert!(tx.tx.try_send(Ok(DirectoryEntry::new("a", "1"))).is_ok());
        assert!(tx.tx.try_send(Ok(DirectoryEntry::new("b", "2"))).is_err());

        assert_eq!(stream.recv().await.unwrap().unwrap().key, "a");
        drop(tx);
        assert!(stream.recv().await.is_none());
    }
}
