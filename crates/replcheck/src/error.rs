//! Error types for the command-line tools.

use replcheck_core::CoreError;
use replcheck_diff::DiffError;
use replcheck_metrics::MetricsError;
use replcheck_store::StoreError;
use thiserror::Error;

/// Errors that end a tool run with a non-zero exit status.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments are missing or inconsistent.
    #[error("invalid arguments: {0}")]
    Config(String),

    #[error("invalid schema: {0}")]
    Schema(#[from] CoreError),

    /// A backing store could not be opened.
    #[error("unable to connect: {0}")]
    Connect(#[source] StoreError),

    #[error("cannot open output: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Result type for tool runs.
pub type Result<T> = std::result::Result<T, ToolError>;
