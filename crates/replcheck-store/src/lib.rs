//! # replcheck store
//!
//! Read access to a directory server's relational backing store. Everything
//! the tools need from a database goes through the [`Backend`] trait, so the
//! comparator and the metrics calculator never see SQL.
//!
//! ## Key Types
//!
//! - [`Backend`] - The async trait for all backing-store queries
//! - [`PostgresBackend`] - Network backing store over `sqlx`
//! - [`SqliteBackend`] - Local snapshot of a backing store, also used by tests
//! - [`EntryStream`] - Lazy ordered sequence of [`DirectoryEntry`] rows
//! - [`TableLookup`] - Result of a change-log query that may hit a missing table
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replcheck_core::Schema;
//! use replcheck_store::{changes, Backend, SqliteBackend};
//!
//! async fn example() {
//!     let schema = Schema::new("LDAPDB2").unwrap();
//!     let backend = SqliteBackend::open("snapshot.db", &schema).unwrap();
//!
//!     for context in backend.replication_contexts(&schema).await.unwrap() {
//!         let count = changes::count_changes(&backend, &schema, &context.change_table())
//!             .await
//!             .unwrap();
//!         println!("{}: {:?}", context.dn, count);
//!     }
//! }
//! ```
//!
//! [`DirectoryEntry`]: replcheck_core::DirectoryEntry

pub mod changes;
pub mod entries;
pub mod error;
pub mod postgres;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use changes::TableLookup;
pub use entries::{entry_channel, EntrySender, EntryStream, ENTRY_CHANNEL_DEPTH};
pub use error::{Result, StoreError};
pub use postgres::{PostgresBackend, PostgresConfig};
pub use sqlite::SqliteBackend;
pub use traits::{Backend, ConsumerRow};
