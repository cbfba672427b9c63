//! # replcheck testkit
//!
//! Testing utilities for replcheck.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: SQLite backing stores seeded with entries, contexts, consumers and changes
//! - **Controls**: Builders for LDIF replication controls carrying a `modifyTimestamp`
//! - **Golden vectors**: Known control encodings with their expected timestamps
//! - **Generators**: Proptest strategies for ordered entry sets
//!
//! ## Test Fixtures
//!
//! ```rust
//! use replcheck_testkit::fixtures::BackingStore;
//!
//! let store = BackingStore::new("LDAPDB2");
//! let context = store.add_context("O=EXAMPLE");
//! store.add_change_at(&context, 100, "20240101120000.000000Z");
//! store.add_consumer(&context, "replica1", 95);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use replcheck_testkit::generators::replica_pair;
//!
//! proptest! {
//!     #[test]
//!     fn sides_are_sorted(pair in replica_pair(50)) {
//!         prop_assert!(pair.first.windows(2).all(|w| w[0].key < w[1].key));
//!         prop_assert!(pair.second.windows(2).all(|w| w[0].key < w[1].key));
//!     }
//! }
//! ```

pub mod controls;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use controls::{ldif_control, timestamp_control, timestamp_control_ldif};
pub use fixtures::BackingStore;
pub use generators::{entry_set, replica_pair, ReplicaPair};
pub use vectors::{all_vectors, verify_all_vectors, GoldenControl};
