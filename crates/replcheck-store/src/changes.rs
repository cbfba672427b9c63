//! Change-table reader.
//!
//! Typed queries over a context's `REPLCHG<eid>` table. A missing table is
//! not a failure here: it is how a backing store says replication was never
//! configured for the context, and it comes back as [`TableLookup::Missing`].

use replcheck_core::{
    consumer_name, ChangeId, ChangeOffset, ChangeTable, ReplicationConsumer, Schema,
};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::traits::Backend;

/// Outcome of a query against a table that may not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLookup<T> {
    /// The table does not exist.
    Missing,
    Found(T),
}

impl<T> TableLookup<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, TableLookup::Missing)
    }

    pub fn found(self) -> Option<T> {
        match self {
            TableLookup::Found(value) => Some(value),
            TableLookup::Missing => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TableLookup<U> {
        match self {
            TableLookup::Found(value) => TableLookup::Found(f(value)),
            TableLookup::Missing => TableLookup::Missing,
        }
    }
}

/// Turn a missing-table error into `TableLookup::Missing`.
fn lookup<T>(result: Result<T>) -> Result<TableLookup<T>> {
    match result {
        Ok(value) => Ok(TableLookup::Found(value)),
        Err(StoreError::TableNotFound { schema, table }) => {
            debug!(%schema, %table, "change table is missing");
            Ok(TableLookup::Missing)
        }
        Err(e) => Err(e),
    }
}

/// Number of changes recorded in a context's change table.
pub async fn count_changes<B: Backend + ?Sized>(
    backend: &B,
    schema: &Schema,
    table: &ChangeTable,
) -> Result<TableLookup<u64>> {
    let count = lookup(backend.count_changes(schema, table).await)?;
    match count {
        TableLookup::Found(n) => u64::try_from(n)
            .map(TableLookup::Found)
            .map_err(|_| StoreError::InvalidData(format!("negative count {} in {}", n, table))),
        TableLookup::Missing => Ok(TableLookup::Missing),
    }
}

/// Highest change id in a context's change table; `None` when it is empty.
pub async fn latest_change_id<B: Backend + ?Sized>(
    backend: &B,
    schema: &Schema,
    table: &ChangeTable,
) -> Result<TableLookup<Option<ChangeId>>> {
    let max = lookup(backend.max_change_id(schema, table).await)?;
    Ok(max.map(|id| id.map(ChangeId)))
}

/// Consumers of a context, each with the change at `lastChangeId + offset`.
///
/// Consumers already at the newest change have no row at offset 1. When
/// `replica` is set, other consumers are skipped.
pub async fn consumers<B: Backend + ?Sized>(
    backend: &B,
    schema: &Schema,
    table: &ChangeTable,
    offset: ChangeOffset,
    replica: Option<&str>,
) -> Result<TableLookup<Vec<ReplicationConsumer>>> {
    let rows = match lookup(backend.consumer_rows(schema, table, offset).await)? {
        TableLookup::Found(rows) => rows,
        TableLookup::Missing => return Ok(TableLookup::Missing),
    };

    let mut consumers = Vec::with_capacity(rows.len());
    for row in rows {
        debug!(
            consumer_dn = %row.consumer_dn,
            control = %row.control,
            last_change_id = row.last_change_id,
            "consumer row"
        );

        let name = match consumer_name(&row.consumer_dn) {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "skipping consumer row");
                continue;
            }
        };
        if replica.is_some_and(|wanted| wanted != name) {
            debug!(consumer = %name, "skipping replica");
            continue;
        }

        consumers.push(ReplicationConsumer {
            name,
            last_change_id: ChangeId(row.last_change_id),
            control: row.control,
        });
    }
    Ok(TableLookup::Found(consumers))
}
