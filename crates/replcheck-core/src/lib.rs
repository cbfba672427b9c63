//! # replcheck core
//!
//! Pure primitives shared by the replication consistency tools: directory
//! entries, replication contexts and consumers, the BER codec used by the
//! replication control, and change timestamp handling.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`DirectoryEntry`] - One `(dn_trunc, modify_timestamp)` row of a backing store
//! - [`ReplicationContext`] - A replicated subtree root
//! - [`ReplicationConsumer`] - One consumer's position in a context's change log
//! - [`BerNode`] - Decoded form of a BER/DER value
//! - [`QueueLength`] - Outstanding changes for a consumer
//!
//! ## Controls
//!
//! Change-log rows carry an LDIF rendering of a BER-encoded control. See the
//! [`control`] module for extraction and the [`ber`] module for the codec.

pub mod ber;
pub mod control;
pub mod error;
pub mod timestamp;
pub mod types;

pub use ber::{BerNode, TagClass};
pub use control::{decode_control_timestamp, find_modify_timestamp};
pub use error::{BerError, ControlError, CoreError, TimestampError};
pub use timestamp::{parse_entry_timestamp, parse_generalized_time};
pub use types::{
    consumer_name, ChangeId, ChangeOffset, ChangeTable, DirectoryEntry, EntryId, QueueLength,
    ReplicationConsumer, ReplicationContext, Schema,
};
