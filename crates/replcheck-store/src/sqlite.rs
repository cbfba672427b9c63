//! SQLite implementation of the Backend trait.
//!
//! Reads a local snapshot of a backing store. The snapshot file is attached
//! under the schema name so the same schema-qualified SQL works as against
//! a network database. Blocking work runs on `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tracing::debug;

use replcheck_core::{
    ChangeOffset, ChangeTable, DirectoryEntry, EntryId, ReplicationContext, Schema,
};

use crate::entries::{entry_channel, EntrySender, EntryStream};
use crate::error::{Result, StoreError};
use crate::schema::{self, ENTRY_TABLE};
use crate::traits::{Backend, ConsumerRow};

/// SQLite-based backend.
///
/// Thread-safe via internal Mutex. A streaming query holds the lock until
/// the stream is exhausted or dropped, so each side of a comparison needs
/// its own backend.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    label: String,
}

impl SqliteBackend {
    /// Open an existing snapshot file and attach it as `schema`.
    pub fn open(path: impl AsRef<Path>, schema: &Schema) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::Connect {
                target: path.display().to_string(),
                message: "no such file".to_string(),
            });
        }

        let label = path.display().to_string();
        Self::attach(&path.to_string_lossy(), schema, label)
    }

    /// Open an empty in-memory store with `schema` attached.
    ///
    /// Useful for testing.
    pub fn open_memory(schema: &Schema) -> Result<Self> {
        Self::attach(":memory:", schema, format!("memory:{}", schema))
    }

    fn attach(target: &str, schema: &Schema, label: String) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(&format!("ATTACH DATABASE ?1 AS {}", schema), params![target])?;
        debug!(database = target, %schema, "attached sqlite database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            label,
        })
    }

    /// Run a closure against the connection on the calling thread.
    ///
    /// Used to seed stores in tests.
    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = lock(&self.conn)?;
        f(&conn)
    }

    /// Execute a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Worker(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Worker(format!("mutex poisoned: {}", e)))
}

/// Map SQLite's missing-table failure to `TableNotFound`.
fn classify(err: rusqlite::Error, schema: &Schema, table: &str) -> StoreError {
    if let rusqlite::Error::SqliteFailure(_, Some(message)) = &err {
        if message.starts_with("no such table") {
            return StoreError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            };
        }
    }
    StoreError::Sqlite(err)
}

/// Run the entry query and push rows until exhausted or the stream drops.
fn produce_entries(conn: &Connection, schema: &Schema, tx: &EntrySender) -> Result<()> {
    let sql = schema::entries_query(schema, "");
    debug!(sql = %sql, "executing entry query");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| classify(e, schema, ENTRY_TABLE))?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let modify_timestamp: Option<String> = row.get(1)?;
        let entry = DirectoryEntry::new(key, modify_timestamp.unwrap_or_default());

        if !tx.blocking_send(Ok(entry)) {
            debug!("entry stream dropped, stopping query");
            break;
        }
    }
    Ok(())
}

#[async_trait]
impl Backend for SqliteBackend {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn stream_entries(&self, schema: &Schema) -> EntryStream {
        let (tx, stream) = entry_channel(self.describe());
        let conn = self.conn.clone();
        let schema = schema.clone();

        tokio::task::spawn_blocking(move || {
            let result = lock(&conn).and_then(|conn| produce_entries(&conn, &schema, &tx));
            if let Err(e) = result {
                tx.blocking_send(Err(e));
            }
        });
        stream
    }

    async fn replication_contexts(&self, schema: &Schema) -> Result<Vec<ReplicationContext>> {
        let schema = schema.clone();
        self.run(move |conn| {
            let sql = schema::contexts_query(&schema);
            debug!(sql = %sql, "executing context query");

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| classify(e, &schema, ENTRY_TABLE))?;
            let contexts = stmt
                .query_map([], |row| {
                    Ok(ReplicationContext {
                        entry_id: EntryId(row.get(0)?),
                        dn: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(contexts)
        })
        .await
    }

    async fn count_changes(&self, schema: &Schema, table: &ChangeTable) -> Result<i64> {
        let schema = schema.clone();
        let table = table.clone();
        self.run(move |conn| {
            let sql = schema::count_query(&schema, &table);
            debug!(sql = %sql, "executing count query");
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(|e| classify(e, &schema, table.as_str()))
        })
        .await
    }

    async fn max_change_id(&self, schema: &Schema, table: &ChangeTable) -> Result<Option<i64>> {
        let schema = schema.clone();
        let table = table.clone();
        self.run(move |conn| {
            let sql = schema::max_query(&schema, &table);
            debug!(sql = %sql, "executing max query");
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(|e| classify(e, &schema, table.as_str()))
        })
        .await
    }

    async fn consumer_rows(
        &self,
        schema: &Schema,
        table: &ChangeTable,
        offset: ChangeOffset,
    ) -> Result<Vec<ConsumerRow>> {
        let schema = schema.clone();
        let table = table.clone();
        self.run(move |conn| {
            let sql = schema::consumers_query(&schema, &table, "?1");
            debug!(sql = %sql, offset = offset.as_i64(), "executing consumer query");

            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| classify(e, &schema, table.as_str()))?;
            let rows = stmt
                .query_map(params![offset.as_i64()], |row| {
                    Ok(ConsumerRow {
                        consumer_dn: row.get(0)?,
                        control: row.get(1)?,
                        last_change_id: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{create_change_table, create_directory_tables};

    fn seeded() -> (SqliteBackend, Schema) {
        let schema = Schema::new("LDAPDB2").unwrap();
        let backend = SqliteBackend::open_memory(&schema).unwrap();
        backend
            .with_connection(|conn| {
                create_directory_tables(conn, &schema)?;
                conn.execute_batch(
                    "INSERT INTO LDAPDB2.ldap_entry VALUES (1, NULL, 'O=EXAMPLE', 'O=EXAMPLE', '2024-01-01 00:00:00');
                     INSERT INTO LDAPDB2.ldap_entry VALUES (2, 1, 'CN=B,O=EXAMPLE', 'CN=B,O=EXAMPLE', '2024-01-02 00:00:00');
                     INSERT INTO LDAPDB2.ldap_entry VALUES (3, 1, 'CN=A,O=EXAMPLE', 'CN=A,O=EXAMPLE', '2024-01-03 00:00:00');
                     INSERT INTO LDAPDB2.ldap_entry VALUES (4, 1, 'IBM-REPLICAGROUP=DEFAULT,O=EXAMPLE', 'IBM-REPLICAGROUP=DEFAULT,O=EXAMPLE', NULL);
                     INSERT INTO LDAPDB2.objectclass VALUES (4, 'IBM-REPLICAGROUP');
                     INSERT INTO LDAPDB2.ldap_entry VALUES (5, 4, 'CN=REPLICA1,IBM-REPLICAGROUP=DEFAULT,O=EXAMPLE', 'CN=REPLICA1,IBM-REPLICAGROUP=DEFAULT,O=EXAMPLE', NULL);
                     INSERT INTO LDAPDB2.replstatus VALUES (5, 10);",
                )?;
                create_change_table(conn, &schema, &ChangeTable::for_context(EntryId(1)))?;
                conn.execute_batch(
                    "INSERT INTO LDAPDB2.REPLCHG1 VALUES (10, 'ten');
                     INSERT INTO LDAPDB2.REPLCHG1 VALUES (11, 'eleven');
                     INSERT INTO LDAPDB2.REPLCHG1 VALUES (12, 'twelve');",
                )?;
                Ok(())
            })
            .unwrap();
        (backend, schema)
    }

    #[tokio::test]
    async fn test_stream_entries_ordered() {
        let (backend, schema) = seeded();
        let mut stream = backend.stream_entries(&schema);

        let mut keys = Vec::new();
        while let Some(entry) = stream.recv().await {
            keys.push(entry.unwrap().key);
        }

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], "CN=A,O=EXAMPLE");
    }

    #[tokio::test]
    async fn test_stream_missing_table_is_error_item() {
        let schema = Schema::new("EMPTY").unwrap();
        let backend = SqliteBackend::open_memory(&schema).unwrap();
        let mut stream = backend.stream_entries(&schema);

        let first = stream.recv().await.unwrap();
        assert!(matches!(first, Err(StoreError::TableNotFound { .. })));
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_stream_releases_connection() {
        let (backend, schema) = seeded();
        let mut stream = backend.stream_entries(&schema);
        stream.recv().await.unwrap().unwrap();
        drop(stream);

        // The producer notices the drop and releases the lock.
        let contexts = backend.replication_contexts(&schema).await.unwrap();
        assert_eq!(contexts.len(), 1);
    }

    #[tokio::test]
    async fn test_replication_contexts() {
        let (backend, schema) = seeded();
        let contexts = backend.replication_contexts(&schema).await.unwrap();
        assert_eq!(
            contexts,
            vec![ReplicationContext {
                entry_id: EntryId(1),
                dn: "O=EXAMPLE".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_count_and_max() {
        let (backend, schema) = seeded();
        let table = ChangeTable::for_context(EntryId(1));
        assert_eq!(backend.count_changes(&schema, &table).await.unwrap(), 3);
        assert_eq!(backend.max_change_id(&schema, &table).await.unwrap(), Some(12));
    }

    #[tokio::test]
    async fn test_missing_change_table() {
        let (backend, schema) = seeded();
        let table = ChangeTable::for_context(EntryId(99));
        let err = backend.count_changes(&schema, &table).await.unwrap_err();
        assert!(err.is_table_not_found());

        let err = backend
            .consumer_rows(&schema, &table, ChangeOffset::LastSuccessful)
            .await
            .unwrap_err();
        assert!(err.is_table_not_found());
    }

    #[tokio::test]
    async fn test_consumer_rows_by_offset() {
        let (backend, schema) = seeded();
        let table = ChangeTable::for_context(EntryId(1));

        let applied = backend
            .consumer_rows(&schema, &table, ChangeOffset::LastSuccessful)
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].control, "ten");
        assert_eq!(applied[0].last_change_id, 10);

        let pending = backend
            .consumer_rows(&schema, &table, ChangeOffset::OldestPending)
            .await
            .unwrap();
        assert_eq!(pending[0].control, "eleven");
    }

    #[test]
    fn test_open_missing_file() {
        let schema = Schema::new("LDAPDB2").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteBackend::open(dir.path().join("absent.db"), &schema);
        assert!(matches!(result, Err(StoreError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_open_file_snapshot() {
        let schema = Schema::new("LDAPDB2").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE ldap_entry (eid INTEGER, peid INTEGER, dn TEXT, dn_trunc TEXT, modify_timestamp TEXT);
                 INSERT INTO ldap_entry VALUES (1, NULL, 'O=X', 'O=X', '2024-01-01 00:00:00');",
            )
            .unwrap();
        }

        let backend = SqliteBackend::open(&path, &schema).unwrap();
        let mut stream = backend.stream_entries(&schema);
        let entry = stream.recv().await.unwrap().unwrap();
        assert_eq!(entry, DirectoryEntry::new("O=X", "2024-01-01 00:00:00"));
        assert_eq!(backend.describe(), path.display().to_string());
    }
}
