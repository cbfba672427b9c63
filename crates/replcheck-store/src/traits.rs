//! Backend trait: the SQL execution capability shared by both tools.
//!
//! Implementations include Postgres (network) and SQLite (local snapshots
//! and tests). Every method is a single attempt; nothing is retried.

use async_trait::async_trait;
use replcheck_core::{ChangeOffset, ChangeTable, ReplicationContext, Schema};

use crate::entries::EntryStream;
use crate::error::Result;

/// One row of the consumer/change-log join, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRow {
    /// `dn_trunc` of the consumer's replication agreement entry.
    pub consumer_dn: String,
    /// Raw `control_long` column of the correlated change.
    pub control: String,
    /// The consumer's `lastChangeId`.
    pub last_change_id: i64,
}

/// The Backend trait: read-only queries against one backing store.
///
/// Query methods on a change-log table return
/// [`StoreError::TableNotFound`](crate::StoreError::TableNotFound) when the
/// table does not exist, so callers can tell "not configured" apart from a
/// real failure.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable label for logs and reports (host, file path).
    fn describe(&self) -> String;

    // ─────────────────────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Stream every `(dn_trunc, modify_timestamp)` row of `LDAP_ENTRY` in
    /// ascending byte order of `dn_trunc`.
    ///
    /// The query starts immediately on a background task and rows are handed
    /// over one at a time. A query failure arrives as an `Err` item, after
    /// which the stream ends.
    fn stream_entries(&self, schema: &Schema) -> EntryStream;

    // ─────────────────────────────────────────────────────────────────────────
    // Replication metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// List replication contexts: parents of `IBM-REPLICAGROUP` entries.
    async fn replication_contexts(&self, schema: &Schema) -> Result<Vec<ReplicationContext>>;

    /// `count(id)` of a change-log table.
    async fn count_changes(&self, schema: &Schema, table: &ChangeTable) -> Result<i64>;

    /// `max(id)` of a change-log table; `None` when it is empty.
    async fn max_change_id(&self, schema: &Schema, table: &ChangeTable) -> Result<Option<i64>>;

    /// Join `REPLSTATUS` with a change-log table on
    /// `lastChangeId + offset = id`.
    async fn consumer_rows(
        &self,
        schema: &Schema,
        table: &ChangeTable,
        offset: ChangeOffset,
    ) -> Result<Vec<ConsumerRow>>;
}
