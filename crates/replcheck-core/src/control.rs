//! Replication control extraction.
//!
//! Change-log rows store the control of the originating change as LDIF text:
//!
//! ```text
//! control: 1.3.18.0.2.10.19 false:: MC0wKwQPbW9kaWZ5VGltZXN0YW1wMRgEFjIwMjQwMTAx
//!  MTIwMDAwLjAwMDAwMFo=
//! ```
//!
//! The base64 payload may be folded over several lines, each continuation
//! starting with a single space. The payload is a BER tree in which the
//! change's `modifyTimestamp` appears as
//! `SEQUENCE { OCTET STRING "modifyTimestamp", SET { OCTET STRING <value> } }`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, trace};

use crate::ber::{self, tags, BerNode};
use crate::error::ControlError;

/// Object identifier of the replication control.
pub const REPLICATION_CONTROL_OID: &str = "1.3.18.0.2.10.19";

/// LDIF prefix preceding the base64 payload in the control column.
pub const CONTROL_MARKER: &str = "control: 1.3.18.0.2.10.19 false:: ";

/// Attribute name searched for in the control tree.
pub const MODIFY_TIMESTAMP_ATTR: &[u8] = b"modifyTimestamp";

/// LDIF line folding: a newline followed by one space.
const LDIF_FOLD: &str = "\n ";

/// Pull the base64 payload out of a raw control column.
///
/// Text after the marker is unfolded and cut at the end of its line. A value
/// without the marker is taken as bare base64.
pub fn extract_payload(raw: &str) -> Result<String, ControlError> {
    let folded = match raw.split_once(CONTROL_MARKER) {
        Some((_, payload)) => payload,
        None => raw,
    };

    let unfolded = folded.replace("\r\n ", "").replace(LDIF_FOLD, "");
    let payload = unfolded.lines().next().unwrap_or_default().trim();

    if payload.is_empty() {
        return Err(ControlError::MissingPayload);
    }
    Ok(payload.to_string())
}

/// Search a control tree for the `modifyTimestamp` attribute value.
///
/// Depth-first, pre-order. Returns the first match. Nodes that do not have
/// the expected shape are searched through, never rejected.
pub fn find_modify_timestamp(node: &BerNode) -> Option<String> {
    if let Some(value) = timestamp_attribute(node) {
        return Some(String::from_utf8_lossy(value).into_owned());
    }

    if !node.constructed {
        return None;
    }
    node.children.iter().find_map(find_modify_timestamp)
}

/// Match `SEQUENCE { OCTET STRING "modifyTimestamp", SET { OCTET STRING v, .. }, .. }`.
fn timestamp_attribute(node: &BerNode) -> Option<&[u8]> {
    if !node.is_universal(tags::SEQUENCE, true) {
        return None;
    }

    let name = node.children.first()?;
    if !name.is_universal(tags::OCTET_STRING, false) || &name.value[..] != MODIFY_TIMESTAMP_ATTR {
        return None;
    }

    let values = node.children.get(1)?;
    if !values.is_universal(tags::SET, true) {
        return None;
    }

    let value = values.children.first()?;
    if !value.is_universal(tags::OCTET_STRING, false) {
        return None;
    }
    Some(&value.value[..])
}

/// Decode a raw control column and return its `modifyTimestamp`, if any.
///
/// Base64 and BER failures are errors; a well-formed control without the
/// attribute is `Ok(None)`.
pub fn decode_control_timestamp(raw: &str) -> Result<Option<String>, ControlError> {
    let payload = extract_payload(raw)?;
    debug!(payload = %payload, "decoding replication control");

    let bytes = STANDARD.decode(payload.as_bytes())?;
    trace!(ber = %hex::encode(&bytes), "control bytes");

    let tree = ber::decode(&bytes)?;
    Ok(find_modify_timestamp(&tree))
}
