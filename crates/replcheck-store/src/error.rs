//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur while querying a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Database error from Postgres.
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// The queried table does not exist in the schema.
    ///
    /// For change-log tables this means replication is not configured for
    /// the context.
    #[error("table {schema}.{table} does not exist")]
    TableNotFound { schema: String, table: String },

    /// Could not connect to the backing store.
    #[error("cannot connect to {target}: {message}")]
    Connect { target: String, message: String },

    /// The blocking worker or its connection lock failed.
    #[error("worker error: {0}")]
    Worker(String),

    /// A row held a value the tools cannot interpret.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// True if the error signals a missing table.
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, StoreError::TableNotFound { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
