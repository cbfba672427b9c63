//! Typed run configurations, built from the command line.

use std::path::PathBuf;

use replcheck_core::Schema;
use replcheck_store::PostgresConfig;

/// Where a backing store lives.
#[derive(Debug, Clone)]
pub enum EndpointSource {
    Network(PostgresConfig),
    /// Local SQLite copy of a backing store.
    Snapshot(PathBuf),
}

/// One backing store and the schema holding the directory tables.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub source: EndpointSource,
    pub schema: Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Csv,
}

/// Configuration of one `ldap-sdiff` run.
#[derive(Debug, Clone)]
pub struct DiffConfig {
    pub first: Endpoint,
    pub second: Endpoint,
    pub format: ReportFormat,
    /// Report destination; stdout when unset.
    pub output_file: Option<PathBuf>,
}

/// Configuration of one `repl-data` run.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub endpoint: Endpoint,
    /// Report only this consumer.
    pub replica: Option<String>,
    pub format: ReportFormat,
    pub output_file: Option<PathBuf>,
}
