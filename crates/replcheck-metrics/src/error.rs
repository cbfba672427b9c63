//! Error types for metrics reporting.

use replcheck_store::StoreError;
use thiserror::Error;

/// Errors that end a metrics run.
///
/// Failures scoped to one context or one consumer are logged and counted
/// in the [`RunSummary`](crate::RunSummary) instead.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("report output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv output failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
