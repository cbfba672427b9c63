//! Postgres implementation of the Backend trait.
//!
//! Uses a single-connection `sqlx` pool per backing store. Entry streaming
//! holds that connection for the life of the stream.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

use replcheck_core::{
    ChangeOffset, ChangeTable, DirectoryEntry, EntryId, ReplicationContext, Schema,
};

use crate::entries::{entry_channel, EntryStream};
use crate::error::{Result, StoreError};
use crate::schema::{self, ENTRY_TABLE};
use crate::traits::{Backend, ConsumerRow};

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

const NUM_POOL_CONNECTIONS: u32 = 1;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Byte-wise ordering of `dn_trunc`, matching `str` comparison.
const BYTE_COLLATION: &str = " COLLATE \"C\"";

/// Connection settings for one network backing store.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: SecretString,
}

impl PostgresConfig {
    /// `host:port/database`, for logs and reports.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Postgres-based backend.
pub struct PostgresBackend {
    pool: PgPool,
    label: String,
}

impl PostgresBackend {
    /// Connect to the database. Fails if the server cannot be reached.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .application_name("replcheck")
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .password(config.password.expose_secret())
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(NUM_POOL_CONNECTIONS)
            .min_connections(NUM_POOL_CONNECTIONS)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect {
                target: config.target(),
                message: e.to_string(),
            })?;

        info!(target_db = %config.target(), user = %config.username, "connected to backing store");
        Ok(Self {
            pool,
            label: config.host.clone(),
        })
    }
}

/// Map Postgres's undefined-table error to `TableNotFound`.
fn classify(err: sqlx::Error, schema: &Schema, table: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNDEFINED_TABLE) {
            return StoreError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            };
        }
    }
    StoreError::Postgres(err)
}

#[async_trait]
impl Backend for PostgresBackend {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn stream_entries(&self, schema: &Schema) -> EntryStream {
        let (tx, stream) = entry_channel(self.describe());
        let pool = self.pool.clone();
        let schema = schema.clone();

        tokio::spawn(async move {
            let sql = schema::entries_query(&schema, BYTE_COLLATION);
            debug!(sql = %sql, "executing entry query");

            let mut rows = sqlx::query_as::<_, (String, Option<String>)>(&sql).fetch(&pool);
            while let Some(row) = rows.next().await {
                let item = row
                    .map(|(key, ts)| DirectoryEntry::new(key, ts.unwrap_or_default()))
                    .map_err(|e| classify(e, &schema, ENTRY_TABLE));
                let failed = item.is_err();

                if !tx.send(item).await {
                    debug!("entry stream dropped, stopping query");
                    break;
                }
                if failed {
                    break;
                }
            }
        });
        stream
    }

    async fn replication_contexts(&self, schema: &Schema) -> Result<Vec<ReplicationContext>> {
        let sql = schema::contexts_query(schema);
        debug!(sql = %sql, "executing context query");

        let rows = sqlx::query_as::<_, (i64, String)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, schema, ENTRY_TABLE))?;

        Ok(rows
            .into_iter()
            .map(|(eid, dn)| ReplicationContext {
                entry_id: EntryId(eid),
                dn,
            })
            .collect())
    }

    async fn count_changes(&self, schema: &Schema, table: &ChangeTable) -> Result<i64> {
        let sql = schema::count_query(schema, table);
        debug!(sql = %sql, "executing count query");

        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, schema, table.as_str()))
    }

    async fn max_change_id(&self, schema: &Schema, table: &ChangeTable) -> Result<Option<i64>> {
        let sql = schema::max_query(schema, table);
        debug!(sql = %sql, "executing max query");

        sqlx::query_scalar::<_, Option<i64>>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, schema, table.as_str()))
    }

    async fn consumer_rows(
        &self,
        schema: &Schema,
        table: &ChangeTable,
        offset: ChangeOffset,
    ) -> Result<Vec<ConsumerRow>> {
        let sql = schema::consumers_query(schema, table, "$1");
        debug!(sql = %sql, offset = offset.as_i64(), "executing consumer query");

        let rows = sqlx::query_as::<_, (String, String, i64)>(&sql)
            .bind(offset.as_i64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify(e, schema, table.as_str()))?;

        Ok(rows
            .into_iter()
            .map(|(consumer_dn, control, last_change_id)| ConsumerRow {
                consumer_dn,
                control,
                last_change_id,
            })
            .collect())
    }
}
