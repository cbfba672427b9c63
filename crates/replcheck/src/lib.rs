//! # replcheck
//!
//! Consistency tools for a replicated directory server whose entries live
//! in a relational backing store.
//!
//! ## Tools
//!
//! - **`ldap-sdiff`**: Compares the entries of two replicas and reports
//!   entries with different modify timestamps or present on one side only
//! - **`repl-data`**: Reports, per replication context and consumer, the
//!   queue length and the ages of the last applied and oldest pending changes
//!
//! Both read either a network database or a local SQLite snapshot of one,
//! and write text or CSV to stdout or a file.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replcheck::config::{Endpoint, EndpointSource, MetricsConfig, ReportFormat};
//! use replcheck::core::Schema;
//! use replcheck::run_metrics;
//!
//! async fn example() -> replcheck::Result<()> {
//!     let config = MetricsConfig {
//!         endpoint: Endpoint {
//!             source: EndpointSource::Snapshot("snapshot.db".into()),
//!             schema: Schema::new("LDAPDB2")?,
//!         },
//!         replica: None,
//!         format: ReportFormat::Text,
//!         output_file: None,
//!     };
//!     let summary = run_metrics(&config).await?;
//!     println!("{} contexts", summary.contexts);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `replcheck::core` - Control decoding and domain types
//! - `replcheck::store` - Backing-store access
//! - `replcheck::diff` - Replica comparison
//! - `replcheck::metrics` - Replication lag

pub mod cli;
pub mod config;
pub mod connect;
pub mod error;
pub mod logging;
pub mod output;
pub mod repl_data;
pub mod sdiff;

pub use replcheck_core as core;
pub use replcheck_diff as diff;
pub use replcheck_metrics as metrics;
pub use replcheck_store as store;

pub use config::{DiffConfig, Endpoint, EndpointSource, MetricsConfig, ReportFormat};
pub use error::{Result, ToolError};
pub use repl_data::run_metrics;
pub use sdiff::{run_diff, DiffRun};
