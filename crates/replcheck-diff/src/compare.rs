//! Sorted two-way merge of entry streams.
//!
//! Both inputs must be strictly ascending by byte order of the key. The
//! readers guarantee this through their `ORDER BY`; the merge does not
//! re-check it. One entry per side is held at a time, and the loop ends
//! after at most `len(first) + len(second)` steps.

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use replcheck_core::DirectoryEntry;
use replcheck_store::{EntryStream, StoreError};
use tracing::{debug, info};

use crate::error::{DiffError, Result};
use crate::report::DiffSink;

/// Which server of the pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::First => f.write_str("first"),
            Side::Second => f.write_str("second"),
        }
    }
}

/// One divergence between the two servers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffRecord {
    /// Present on both with different modify timestamps.
    Mismatch {
        key: String,
        first_timestamp: String,
        second_timestamp: String,
    },
    /// Present on one server only.
    Missing {
        key: String,
        /// Timestamp on the server that has the entry.
        timestamp: String,
        missing_on: Side,
    },
}

impl DiffRecord {
    pub fn key(&self) -> &str {
        match self {
            DiffRecord::Mismatch { key, .. } | DiffRecord::Missing { key, .. } => key,
        }
    }
}

/// Counters for one comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    /// Entries read from the first server.
    pub first_entries: u64,
    /// Entries read from the second server.
    pub second_entries: u64,
    /// Shared keys with equal timestamps.
    pub matched: u64,
    pub mismatched: u64,
    /// Keys present only on the second server.
    pub missing_on_first: u64,
    /// Keys present only on the first server.
    pub missing_on_second: u64,
}

impl DiffSummary {
    /// Total records emitted.
    pub fn differences(&self) -> u64 {
        self.mismatched + self.missing_on_first + self.missing_on_second
    }

    pub fn entries(&self, side: Side) -> u64 {
        match side {
            Side::First => self.first_entries,
            Side::Second => self.second_entries,
        }
    }

    fn count_read(&mut self, side: Side) {
        match side {
            Side::First => self.first_entries += 1,
            Side::Second => self.second_entries += 1,
        }
    }

    fn count_missing(&mut self, missing_on: Side) {
        match missing_on {
            Side::First => self.missing_on_first += 1,
            Side::Second => self.missing_on_second += 1,
        }
    }
}

/// An ordered, single-pass source of entries.
#[async_trait]
pub trait EntrySource: Send {
    /// Next entry; `None` once exhausted.
    async fn next_entry(&mut self) -> Option<std::result::Result<DirectoryEntry, StoreError>>;
}

#[async_trait]
impl EntrySource for EntryStream {
    async fn next_entry(&mut self) -> Option<std::result::Result<DirectoryEntry, StoreError>> {
        self.recv().await
    }
}

/// An in-memory source. Entries must already be sorted.
pub struct VecSource {
    entries: std::vec::IntoIter<DirectoryEntry>,
}

impl VecSource {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

#[async_trait]
impl EntrySource for VecSource {
    async fn next_entry(&mut self) -> Option<std::result::Result<DirectoryEntry, StoreError>> {
        self.entries.next().map(Ok)
    }
}

/// Pull the next entry of one side, counting it.
async fn pull<S: EntrySource + ?Sized>(
    source: &mut S,
    side: Side,
    summary: &mut DiffSummary,
) -> Result<Option<DirectoryEntry>> {
    match source.next_entry().await {
        Some(Ok(entry)) => {
            summary.count_read(side);
            Ok(Some(entry))
        }
        Some(Err(source)) => Err(DiffError::Stream {
            side,
            source,
            summary: summary.clone(),
        }),
        None => Ok(None),
    }
}

fn missing(entry: DirectoryEntry, missing_on: Side) -> DiffRecord {
    DiffRecord::Missing {
        key: entry.key,
        timestamp: entry.modify_timestamp,
        missing_on,
    }
}

/// Compare two ordered entry sources and send every divergence to `sink`.
///
/// Returns the counters on success. A failure on either stream ends the
/// comparison with [`DiffError::Stream`]; records already sent stay valid.
pub async fn compare<A, B, S>(first: &mut A, second: &mut B, sink: &mut S) -> Result<DiffSummary>
where
    A: EntrySource + ?Sized,
    B: EntrySource + ?Sized,
    S: DiffSink + ?Sized,
{
    let mut summary = DiffSummary::default();

    let mut a = pull(first, Side::First, &mut summary).await?;
    let mut b = pull(second, Side::Second, &mut summary).await?;

    loop {
        match (a.take(), b.take()) {
            (Some(x), Some(y)) => {
                debug!(first = %x.key, second = %y.key, "comparing entries");
                match x.key.cmp(&y.key) {
                    Ordering::Equal => {
                        if x.modify_timestamp == y.modify_timestamp {
                            summary.matched += 1;
                        } else {
                            summary.mismatched += 1;
                            sink.record(&DiffRecord::Mismatch {
                                key: x.key,
                                first_timestamp: x.modify_timestamp,
                                second_timestamp: y.modify_timestamp,
                            })?;
                        }
                        a = pull(first, Side::First, &mut summary).await?;
                        b = pull(second, Side::Second, &mut summary).await?;
                    }
                    Ordering::Less => {
                        summary.count_missing(Side::Second);
                        sink.record(&missing(x, Side::Second))?;
                        a = pull(first, Side::First, &mut summary).await?;
                        b = Some(y);
                    }
                    Ordering::Greater => {
                        summary.count_missing(Side::First);
                        sink.record(&missing(y, Side::First))?;
                        a = Some(x);
                        b = pull(second, Side::Second, &mut summary).await?;
                    }
                }
            }
            (Some(x), None) => {
                summary.count_missing(Side::Second);
                sink.record(&missing(x, Side::Second))?;
                a = pull(first, Side::First, &mut summary).await?;
            }
            (None, Some(y)) => {
                summary.count_missing(Side::First);
                sink.record(&missing(y, Side::First))?;
                b = pull(second, Side::Second, &mut summary).await?;
            }
            (None, None) => break,
        }
    }

    info!(
        first_entries = summary.first_entries,
        second_entries = summary.second_entries,
        differences = summary.differences(),
        "comparison complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<DirectoryEntry> {
        pairs
            .iter()
            .map(|(k, ts)| DirectoryEntry::new(*k, *ts))
            .collect()
    }

    async fn run(first: &[(&str, &str)], second: &[(&str, &str)]) -> (Vec<DiffRecord>, DiffSummary) {
        let mut records = Vec::new();
        let summary = compare(
            &mut VecSource::new(entries(first)),
            &mut VecSource::new(entries(second)),
            &mut records,
        )
        .await
        .unwrap();
        (records, summary)
    }

    #[tokio::test]
    async fn test_reference_scenario() {
        let (records, summary) = run(
            &[("a", "10"), ("b", "20"), ("c", "30")],
            &[("a", "10"), ("b", "25"), ("d", "40")],
        )
        .await;

        assert_eq!(
            records,
            vec![
                DiffRecord::Mismatch {
                    key: "b".into(),
                    first_timestamp: "20".into(),
                    second_timestamp: "25".into(),
                },
                DiffRecord::Missing {
                    key: "c".into(),
                    timestamp: "30".into(),
                    missing_on: Side::Second,
                },
                DiffRecord::Missing {
                    key: "d".into(),
                    timestamp: "40".into(),
                    missing_on: Side::First,
                },
            ]
        );
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.first_entries, 3);
        assert_eq!(summary.second_entries, 3);
        assert_eq!(summary.differences(), 3);
    }

    #[tokio::test]
    async fn test_identical_sides() {
        let side = [("a", "1"), ("b", "2")];
        let (records, summary) = run(&side, &side).await;
        assert!(records.is_empty());
        assert_eq!(summary.matched, 2);
    }

    #[tokio::test]
    async fn test_one_side_empty() {
        let (records, summary) = run(&[], &[("a", "1"), ("b", "2")]).await;
        assert_eq!(records.len(), 2);
        assert_eq!(summary.missing_on_first, 2);
        assert_eq!(summary.first_entries, 0);

        let (records, summary) = run(&[("a", "1")], &[]).await;
        assert_eq!(records.len(), 1);
        assert_eq!(summary.missing_on_second, 1);
    }

    #[tokio::test]
    async fn test_both_empty() {
        let (records, summary) = run(&[], &[]).await;
        assert!(records.is_empty());
        assert_eq!(summary, DiffSummary::default());
    }

    #[tokio::test]
    async fn test_byte_order_keys() {
        // Upper case sorts before lower case in byte order.
        let (records, _) = run(&[("B", "1"), ("a", "1")], &[("a", "1")]).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "B");
    }

    #[tokio::test]
    async fn test_interleaved_missing() {
        let (records, summary) = run(
            &[("a", "1"), ("c", "1"), ("e", "1")],
            &[("b", "1"), ("c", "1"), ("f", "1")],
        )
        .await;
        let keys: Vec<&str> = records.iter().map(DiffRecord::key).collect();
        assert_eq!(keys, vec!["a", "b", "e", "f"]);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.missing_on_first, 2);
        assert_eq!(summary.missing_on_second, 2);
    }

    #[tokio::test]
    async fn test_stream_error_aborts_with_partial_summary() {
        let mut first = EntryStream::from_entries("one", entries(&[("a", "1"), ("b", "1")]));
        let mut second = EntryStream::failed(
            "two",
            StoreError::InvalidData("connection reset".into()),
        );
        let mut records = Vec::new();

        let err = compare(&mut first, &mut second, &mut records)
            .await
            .unwrap_err();
        match err {
            DiffError::Stream { side, summary, .. } => {
                assert_eq!(side, Side::Second);
                assert_eq!(summary.first_entries, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_entry_streams() {
        let mut first = EntryStream::from_entries("one", entries(&[("a", "1"), ("c", "1")]));
        let mut second = EntryStream::from_entries("two", entries(&[("a", "2"), ("b", "1")]));
        let mut records = Vec::new();

        let summary = compare(&mut first, &mut second, &mut records).await.unwrap();
        assert_eq!(summary.mismatched, 1);
        assert_eq!(summary.missing_on_first, 1);
        assert_eq!(summary.missing_on_second, 1);
    }
}
