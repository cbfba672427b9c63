//! # replcheck diff
//!
//! Compares the entries of two replicas of the same directory subtree.
//!
//! Both sides are read as ordered [`EntrySource`]s and merged in a single
//! pass. Every divergence becomes a [`DiffRecord`] handed to a [`DiffSink`]
//! as soon as it is found; nothing is buffered beyond one entry per side.
//!
//! ## Key Types
//!
//! - [`compare`] - The merge loop
//! - [`DiffRecord`] - A mismatched or missing entry
//! - [`DiffSummary`] - Counters for one comparison
//! - [`TextDiffSink`] / [`CsvDiffSink`] - Report formats
//!
//! ## Classification
//!
//! ```text
//! key(first) == key(second), same timestamp   -> matched, nothing emitted
//! key(first) == key(second), other timestamp  -> Mismatch
//! key(first) <  key(second)                   -> Missing { missing_on: Second }
//! key(first) >  key(second)                   -> Missing { missing_on: First }
//! ```

pub mod compare;
pub mod error;
pub mod report;

pub use compare::{compare, DiffRecord, DiffSummary, EntrySource, Side, VecSource};
pub use error::{DiffError, Result};
pub use report::{CsvDiffSink, DiffSink, TextDiffSink};
