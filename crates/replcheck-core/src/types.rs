//! Strong type definitions for directory entries and replication state.
//!
//! Identifiers are newtypes so an entry id cannot be passed where a change
//! id is expected.

use std::fmt;

use crate::error::CoreError;

/// Maximum length accepted for a schema identifier.
const MAX_SCHEMA_LEN: usize = 128;

/// Prefix of the per-context change-log table name.
const CHANGE_TABLE_PREFIX: &str = "REPLCHG";

/// Identifier of a row in `LDAP_ENTRY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row id in a context's change-log table.
///
/// Assigned monotonically by the change log; a consumer's `lastChangeId`
/// refers to the same sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeId(pub i64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated schema name.
///
/// Schema and table names cannot be bound as query parameters, so they are
/// interpolated into SQL text. Only plain identifiers are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Schema(String);

impl Schema {
    /// Validate a schema name.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#' | '@'));

        if !valid_start || !valid_rest || name.len() > MAX_SCHEMA_LEN {
            return Err(CoreError::InvalidSchema(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the change-log table of one replication context (`REPLCHG<eid>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChangeTable(String);

impl ChangeTable {
    pub fn for_context(entry_id: EntryId) -> Self {
        Self(format!("{}{}", CHANGE_TABLE_PREFIX, entry_id.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which change to correlate with a consumer's `lastChangeId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeOffset {
    /// The last change the consumer applied (`lastChangeId + 0`).
    LastSuccessful,
    /// The first change the consumer has not applied (`lastChangeId + 1`).
    OldestPending,
}

impl ChangeOffset {
    pub const fn as_i64(self) -> i64 {
        match self {
            ChangeOffset::LastSuccessful => 0,
            ChangeOffset::OldestPending => 1,
        }
    }
}

/// One entry of a backing store, keyed by its truncated DN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// `dn_trunc`, the sort and compare key.
    pub key: String,
    /// `modify_timestamp` as rendered by the backing store.
    pub modify_timestamp: String,
}

impl DirectoryEntry {
    pub fn new(key: impl Into<String>, modify_timestamp: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modify_timestamp: modify_timestamp.into(),
        }
    }
}

/// A replicated subtree root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicationContext {
    pub entry_id: EntryId,
    pub dn: String,
}

impl ReplicationContext {
    /// The change-log table holding this context's changes.
    pub fn change_table(&self) -> ChangeTable {
        ChangeTable::for_context(self.entry_id)
    }
}

/// One consumer's row joined against a change-log table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicationConsumer {
    /// Value of the first RDN of the consumer's DN.
    pub name: String,
    pub last_change_id: ChangeId,
    /// Raw control column of the correlated change row.
    pub control: String,
}

/// Extract a consumer name from its DN: the value of the first RDN.
///
/// `cn=replica1,cn=context` yields `replica1`.
pub fn consumer_name(dn: &str) -> Result<String, CoreError> {
    let rdn = dn.split_once(',').map_or(dn, |(rdn, _)| rdn);
    let (_, value) = rdn
        .split_once('=')
        .ok_or_else(|| CoreError::InvalidDn(dn.to_string()))?;
    Ok(value.trim().to_string())
}

/// Number of changes a consumer has not applied yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueLength {
    pub pending: u64,
    /// The consumer claimed a position past the latest change; `pending` was
    /// clamped to zero.
    pub clamped: bool,
}

impl QueueLength {
    /// `max(0, latest - last_applied)`.
    pub fn between(latest: ChangeId, last_applied: ChangeId) -> Self {
        let delta = i128::from(latest.0) - i128::from(last_applied.0);
        if delta < 0 {
            return Self {
                pending: 0,
                clamped: true,
            };
        }
        Self {
            pending: u64::try_from(delta).unwrap_or(u64::MAX),
            clamped: false,
        }
    }

    pub fn is_caught_up(&self) -> bool {
        self.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_accepts_identifiers() {
        assert_eq!(Schema::new("LDAPDB2").unwrap().as_str(), "LDAPDB2");
        assert!(Schema::new("_tmp$1").is_ok());
    }

    #[test]
    fn test_schema_rejects_injection() {
        assert!(Schema::new("").is_err());
        assert!(Schema::new("1abc").is_err());
        assert!(Schema::new("ldap; drop table x").is_err());
        assert!(Schema::new("a.b").is_err());
        assert!(Schema::new("x".repeat(129)).is_err());
    }

    #[test]
    fn test_change_table_name() {
        let table = ChangeTable::for_context(EntryId(42));
        assert_eq!(table.as_str(), "REPLCHG42");
    }

    #[test]
    fn test_consumer_name() {
        assert_eq!(consumer_name("cn=replica1,cn=ctx,o=example").unwrap(), "replica1");
        assert_eq!(consumer_name("cn=host.example.com:389").unwrap(), "host.example.com:389");
        assert_eq!(consumer_name("cn=a=b,o=x").unwrap(), "a=b");
        assert!(consumer_name("replica1,o=x").is_err());
    }

    #[test]
    fn test_queue_length() {
        let q = QueueLength::between(ChangeId(100), ChangeId(95));
        assert_eq!(q.pending, 5);
        assert!(!q.clamped);
        assert!(!q.is_caught_up());

        let caught_up = QueueLength::between(ChangeId(100), ChangeId(100));
        assert!(caught_up.is_caught_up());
        assert!(!caught_up.clamped);
    }

    #[test]
    fn test_queue_length_clamps_negative() {
        let q = QueueLength::between(ChangeId(10), ChangeId(12));
        assert_eq!(q.pending, 0);
        assert!(q.clamped);
    }

    #[test]
    fn test_queue_length_extremes() {
        let q = QueueLength::between(ChangeId(i64::MAX), ChangeId(i64::MIN));
        assert_eq!(q.pending, u64::MAX);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(ChangeOffset::LastSuccessful.as_i64(), 0);
        assert_eq!(ChangeOffset::OldestPending.as_i64(), 1);
    }
}
