//! # replcheck metrics
//!
//! Replication lag per consumer, per replication context.
//!
//! For every context the calculator reads the change table once for the
//! latest change id, then joins each consumer's `lastChangeId` against the
//! change table twice: at offset 0 for the last change it applied and at
//! offset 1 for the oldest change still pending. The timestamps come from
//! the replication control stored with each change.
//!
//! ## Key Types
//!
//! - [`report_contexts`] - Walk all contexts of a backing store
//! - [`ReportSink`] - Event-driven report output
//! - [`TextSink`] / [`CsvSink`] - Report formats
//! - [`RunSummary`] - Counters for one run
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use replcheck_core::Schema;
//! use replcheck_metrics::{report_contexts, TextSink};
//! use replcheck_store::SqliteBackend;
//!
//! async fn example() -> replcheck_metrics::Result<()> {
//!     let schema = Schema::new("LDAPDB2").unwrap();
//!     let backend = SqliteBackend::open("snapshot.db", &schema)?;
//!     let mut sink = TextSink::new(std::io::stdout());
//!
//!     let summary = report_contexts(&backend, &schema, None, &mut sink, Utc::now()).await?;
//!     println!("{} contexts", summary.contexts);
//!     Ok(())
//! }
//! ```

pub mod calculator;
pub mod error;
pub mod sink;

pub use calculator::{report_contexts, ChangeAge, ChangeTime, ContextOutcome, RunSummary};
pub use error::{MetricsError, Result};
pub use sink::{format_age, CsvSink, ReportSink, TextSink};
