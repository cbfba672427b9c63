//! Seeded backing stores.
//!
//! A [`BackingStore`] is an SQLite store laid out the way a directory
//! server lays out its tables, with helpers to add entries, replication
//! contexts, change-log rows and consumers.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use rusqlite::{params, Connection};

use replcheck_core::{ChangeTable, EntryId, ReplicationContext, Schema};
use replcheck_store::schema::{
    create_change_table, create_directory_tables, REPLICA_GROUP_CLASS,
};
use replcheck_store::SqliteBackend;

use crate::controls::timestamp_control_ldif;

/// An SQLite backing store for tests.
pub struct BackingStore {
    backend: SqliteBackend,
    schema: Schema,
    next_eid: AtomicI64,
}

impl BackingStore {
    /// An in-memory store with empty directory tables.
    pub fn new(schema: &str) -> Self {
        let schema = Schema::new(schema).expect("valid schema name");
        let backend = SqliteBackend::open_memory(&schema).expect("open memory store");
        Self::init(backend, schema)
    }

    /// A store backed by a file at `path`, created if absent.
    ///
    /// The file can be reopened with [`SqliteBackend::open`] by the code
    /// under test.
    pub fn at_path(path: impl AsRef<Path>, schema: &str) -> Self {
        let path = path.as_ref();
        Connection::open(path).expect("create snapshot file");

        let schema = Schema::new(schema).expect("valid schema name");
        let backend = SqliteBackend::open(path, &schema).expect("open snapshot file");
        Self::init(backend, schema)
    }

    fn init(backend: SqliteBackend, schema: Schema) -> Self {
        backend
            .with_connection(|conn| create_directory_tables(conn, &schema))
            .expect("create directory tables");
        Self {
            backend,
            schema,
            next_eid: AtomicI64::new(1),
        }
    }

    pub fn backend(&self) -> &SqliteBackend {
        &self.backend
    }

    pub fn into_backend(self) -> SqliteBackend {
        self.backend
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn insert_entry(&self, parent: Option<EntryId>, dn: &str, modify_timestamp: &str) -> EntryId {
        let eid = EntryId(self.next_eid.fetch_add(1, Ordering::Relaxed));
        let sql = format!(
            "INSERT INTO {}.ldap_entry (eid, peid, dn, dn_trunc, modify_timestamp) \
             VALUES (?1, ?2, ?3, ?3, ?4)",
            self.schema
        );
        self.backend
            .with_connection(|conn| {
                conn.execute(&sql, params![eid.0, parent.map(|p| p.0), dn, modify_timestamp])?;
                Ok(())
            })
            .expect("insert entry");
        eid
    }

    /// Add a plain entry keyed by `key`.
    pub fn add_entry(&self, key: &str, modify_timestamp: &str) -> EntryId {
        self.insert_entry(None, key, modify_timestamp)
    }

    /// Add a replication context: its root entry, a replica group under
    /// it, and an empty change table.
    pub fn add_context(&self, dn: &str) -> ReplicationContext {
        let entry_id = self.insert_entry(None, dn, "2024-01-01 00:00:00.000000");
        let group = self.insert_entry(
            Some(entry_id),
            &group_dn(dn),
            "2024-01-01 00:00:00.000000",
        );

        let context = ReplicationContext {
            entry_id,
            dn: dn.to_string(),
        };
        let sql = format!(
            "INSERT INTO {}.objectclass (eid, objectclass) VALUES (?1, ?2)",
            self.schema
        );
        self.backend
            .with_connection(|conn| {
                conn.execute(&sql, params![group.0, REPLICA_GROUP_CLASS])?;
                create_change_table(conn, &self.schema, &context.change_table())
            })
            .expect("create replication context");
        context
    }

    /// Drop a context's change table, as on a server that never replicated it.
    pub fn drop_change_table(&self, context: &ReplicationContext) {
        let sql = format!("DROP TABLE {}.{}", self.schema, context.change_table());
        self.backend
            .with_connection(|conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .expect("drop change table");
    }

    /// Add a change-log row with a raw control column.
    pub fn add_change(&self, context: &ReplicationContext, id: i64, control: &str) {
        let table: ChangeTable = context.change_table();
        let sql = format!(
            "INSERT INTO {}.{} (id, control_long) VALUES (?1, ?2)",
            self.schema, table
        );
        self.backend
            .with_connection(|conn| {
                conn.execute(&sql, params![id, control])?;
                Ok(())
            })
            .expect("insert change");
    }

    /// Add a change-log row whose control carries `modifyTimestamp`.
    pub fn add_change_at(&self, context: &ReplicationContext, id: i64, timestamp: &str) {
        self.add_change(context, id, &timestamp_control_ldif(timestamp));
    }

    /// Add a consumer of `context` that has applied changes up to `last_change_id`.
    pub fn add_consumer(&self, context: &ReplicationContext, name: &str, last_change_id: i64) {
        let dn = format!("CN={},{}", name, group_dn(&context.dn));
        let eid = self.insert_entry(None, &dn, "2024-01-01 00:00:00.000000");

        let sql = format!(
            "INSERT INTO {}.replstatus (eid, lastchangeid) VALUES (?1, ?2)",
            self.schema
        );
        self.backend
            .with_connection(|conn| {
                conn.execute(&sql, params![eid.0, last_change_id])?;
                Ok(())
            })
            .expect("insert replication status");
    }
}

fn group_dn(context_dn: &str) -> String {
    format!("IBM-REPLICAGROUP=DEFAULT,{}", context_dn)
}
