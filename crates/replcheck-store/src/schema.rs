//! Backing-store table layout: query text shared by the backends and DDL
//! for building SQLite stores.
//!
//! Tables, per schema:
//!
//! | Table | Columns used |
//! |---|---|
//! | `LDAP_ENTRY` | `eid`, `peid`, `dn`, `dn_trunc`, `modify_timestamp` |
//! | `OBJECTCLASS` | `eid`, `objectclass` |
//! | `REPLSTATUS` | `eid`, `lastchangeid` |
//! | `REPLCHG<eid>` | `id`, `control_long` |
//!
//! Schema and table names are interpolated; both are validated identifiers.
//! Values are always bound.

use replcheck_core::{ChangeTable, Schema};
use rusqlite::Connection;

use crate::error::Result;

/// Object class marking a replication group entry; its parent is the context.
pub const REPLICA_GROUP_CLASS: &str = "IBM-REPLICAGROUP";

pub const ENTRY_TABLE: &str = "LDAP_ENTRY";
pub const OBJECTCLASS_TABLE: &str = "OBJECTCLASS";
pub const REPLSTATUS_TABLE: &str = "REPLSTATUS";

/// All entries ordered by key. `collation` is appended to the sort key.
pub(crate) fn entries_query(schema: &Schema, collation: &str) -> String {
    format!(
        "SELECT dn_trunc, CAST(modify_timestamp AS TEXT) FROM {schema}.ldap_entry \
         ORDER BY dn_trunc{collation}"
    )
}

pub(crate) fn contexts_query(schema: &Schema) -> String {
    format!(
        "SELECT ctx.eid, ctx.dn_trunc FROM {schema}.ldap_entry ctx \
         WHERE ctx.eid IN (\
         SELECT grp.peid FROM {schema}.ldap_entry grp \
         JOIN {schema}.objectclass oc ON grp.eid = oc.eid \
         WHERE oc.objectclass = '{REPLICA_GROUP_CLASS}') \
         ORDER BY ctx.eid"
    )
}

pub(crate) fn count_query(schema: &Schema, table: &ChangeTable) -> String {
    format!("SELECT COUNT(id) FROM {schema}.{table}")
}

pub(crate) fn max_query(schema: &Schema, table: &ChangeTable) -> String {
    format!("SELECT MAX(id) FROM {schema}.{table}")
}

/// Consumer rows joined on `lastchangeid + <offset> = id`. `placeholder` is
/// the backend's first positional parameter.
pub(crate) fn consumers_query(schema: &Schema, table: &ChangeTable, placeholder: &str) -> String {
    format!(
        "SELECT e.dn_trunc, c.control_long, r.lastchangeid \
         FROM {schema}.ldap_entry e \
         JOIN {schema}.replstatus r ON e.eid = r.eid \
         JOIN {schema}.{table} c ON r.lastchangeid + {placeholder} = c.id \
         ORDER BY e.dn_trunc"
    )
}

/// Create the entry, object class and replication status tables.
pub fn create_directory_tables(conn: &Connection, schema: &Schema) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}.ldap_entry (
            eid INTEGER PRIMARY KEY,
            peid INTEGER,
            dn TEXT NOT NULL,
            dn_trunc TEXT NOT NULL,
            modify_timestamp TEXT
        );
        CREATE INDEX IF NOT EXISTS {schema}.ldap_entry_dn_trunc ON ldap_entry (dn_trunc);

        CREATE TABLE IF NOT EXISTS {schema}.objectclass (
            eid INTEGER NOT NULL,
            objectclass TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {schema}.replstatus (
            eid INTEGER PRIMARY KEY,
            lastchangeid INTEGER NOT NULL
        );
        "#
    ))?;
    Ok(())
}

/// Create a context's change-log table.
pub fn create_change_table(conn: &Connection, schema: &Schema, table: &ChangeTable) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {schema}.{table} (
            id INTEGER PRIMARY KEY,
            control_long TEXT NOT NULL DEFAULT ''
        );
        "#
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use replcheck_core::EntryId;

    #[test]
    fn test_queries_qualify_schema() {
        let schema = Schema::new("LDAPDB2").unwrap();
        let table = ChangeTable::for_context(EntryId(7));

        assert_eq!(count_query(&schema, &table), "SELECT COUNT(id) FROM LDAPDB2.REPLCHG7");
        assert_eq!(max_query(&schema, &table), "SELECT MAX(id) FROM LDAPDB2.REPLCHG7");
        assert!(consumers_query(&schema, &table, "$1").contains("r.lastchangeid + $1 = c.id"));
        assert!(entries_query(&schema, " COLLATE \"C\"").ends_with("ORDER BY dn_trunc COLLATE \"C\""));
        assert!(contexts_query(&schema).contains("'IBM-REPLICAGROUP'"));
    }

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("ATTACH DATABASE ':memory:' AS s1", []).unwrap();
        let schema = Schema::new("s1").unwrap();

        create_directory_tables(&conn, &schema).unwrap();
        create_change_table(&conn, &schema, &ChangeTable::for_context(EntryId(3))).unwrap();
        // Idempotent.
        create_directory_tables(&conn, &schema).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM s1.REPLCHG3", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
