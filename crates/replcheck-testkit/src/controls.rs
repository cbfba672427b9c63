//! Builders for replication controls as they appear in a change-log row.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use replcheck_core::ber::{self, BerNode};
use replcheck_core::control::{CONTROL_MARKER, MODIFY_TIMESTAMP_ATTR};

/// Width of an LDIF line, continuation space included.
const LDIF_LINE_WIDTH: usize = 76;

/// A control tree holding one `modifyTimestamp` attribute.
pub fn timestamp_control(timestamp: &str) -> BerNode {
    BerNode::sequence(vec![BerNode::sequence(vec![
        BerNode::octet_string(MODIFY_TIMESTAMP_ATTR),
        BerNode::set(vec![BerNode::octet_string(timestamp.as_bytes().to_vec())]),
    ])])
}

/// Render BER bytes as an LDIF control line, folded at 76 columns.
pub fn ldif_control(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::from(CONTROL_MARKER);

    let mut rest = encoded.as_str();
    let first = (LDIF_LINE_WIDTH - CONTROL_MARKER.len()).min(rest.len());
    out.push_str(&rest[..first]);
    rest = &rest[first..];

    while !rest.is_empty() {
        let take = (LDIF_LINE_WIDTH - 1).min(rest.len());
        out.push_str("\n ");
        out.push_str(&rest[..take]);
        rest = &rest[take..];
    }
    out
}

/// The control column of a change made at `timestamp`.
pub fn timestamp_control_ldif(timestamp: &str) -> String {
    ldif_control(&ber::encode(&timestamp_control(timestamp)))
}
