//! Golden replication controls.
//!
//! Known control encodings with the `modifyTimestamp` each must yield.
//! They cover a definite-length control, an attribute that is not first
//! in its list, a control without the attribute, and an indefinite-length
//! outer sequence.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use replcheck_core::decode_control_timestamp;

use crate::controls::ldif_control;

/// A golden control.
#[derive(Debug, Clone)]
pub struct GoldenControl {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Unfolded base64 payload.
    pub payload: &'static str,
    /// Expected `modifyTimestamp`, `None` when the control carries none.
    pub expected: Option<&'static str>,
}

impl GoldenControl {
    /// The payload as a folded LDIF control column.
    pub fn ldif(&self) -> String {
        let bytes = STANDARD
            .decode(self.payload)
            .expect("golden payload is valid base64");
        ldif_control(&bytes)
    }
}

/// Get all golden controls.
pub fn all_vectors() -> Vec<GoldenControl> {
    vec![
        GoldenControl {
            name: "single modifyTimestamp with fraction",
            payload: "MC0wKwQPbW9kaWZ5VGltZXN0YW1wMRgEFjIwMjQwMTAxMTIwMDAwLjAwMDAwMFo=",
            expected: Some("20240101120000.000000Z"),
        },
        GoldenControl {
            name: "modifyTimestamp after modifiersName",
            payload: "MEIwGgQNbW9kaWZpZXJzTmFtZTEJBAdjbj1yb290MCQED21vZGlmeVRpbWVzdGFtcDERBA8yMDIzMTExNTA4MzAwMFo=",
            expected: Some("20231115083000Z"),
        },
        GoldenControl {
            name: "no modifyTimestamp",
            payload: "MBwwGgQNbW9kaWZpZXJzTmFtZTEJBAdjbj1yb290",
            expected: None,
        },
        GoldenControl {
            name: "indefinite-length outer sequence",
            payload: "MIAwJAQPbW9kaWZ5VGltZXN0YW1wMREEDzIwMjIwMjAyMDIwMjAyWgAA",
            expected: Some("20220202020202Z"),
        },
    ]
}

/// Decode every golden control, both bare and as folded LDIF.
///
/// Returns `(name, matches, found)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, Option<String>)> {
    all_vectors()
        .iter()
        .map(|v| {
            let bare = decode_control_timestamp(v.payload).ok().flatten();
            let folded = decode_control_timestamp(&v.ldif()).ok().flatten();
            let matches = bare.as_deref() == v.expected && folded == bare;
            (v.name.to_string(), matches, bare)
        })
        .collect()
}
