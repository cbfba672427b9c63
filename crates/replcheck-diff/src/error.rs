//! Error types for the diff module.

use thiserror::Error;

use crate::compare::{DiffSummary, Side};

/// Errors that end a comparison.
#[derive(Debug, Error)]
pub enum DiffError {
    /// One side's entry stream failed. Records emitted before the failure
    /// remain valid; `summary` counts what was compared.
    #[error("reading entries from the {side} server failed: {source}")]
    Stream {
        side: Side,
        #[source]
        source: replcheck_store::StoreError,
        summary: DiffSummary,
    },

    /// Writing the report failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a CSV record failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for diff operations.
pub type Result<T> = std::result::Result<T, DiffError>;
