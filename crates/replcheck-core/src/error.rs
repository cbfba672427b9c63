//! Error types for replcheck core.

use thiserror::Error;

/// Errors raised while building core values from untrusted input.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid schema name: {0:?}")]
    InvalidSchema(String),

    #[error("distinguished name has no attribute value in its first RDN: {0:?}")]
    InvalidDn(String),
}

/// Errors from the BER decoder.
///
/// Offsets are byte positions in the decoded buffer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BerError {
    #[error("empty input")]
    Empty,

    #[error("truncated value at offset {offset}: need {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("length field at offset {offset} does not fit in memory")]
    LengthOverflow { offset: usize },

    #[error("tag number at offset {offset} is too large")]
    TagOverflow { offset: usize },

    #[error("primitive value at offset {offset} uses indefinite length")]
    IndefinitePrimitive { offset: usize },

    #[error("indefinite-length value at offset {offset} has no end-of-contents marker")]
    Unterminated { offset: usize },

    #[error("child value overruns its parent ending at offset {end}")]
    Overrun { end: usize },

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
}

/// Errors while turning a raw control column into a BER tree.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control column carries no payload")]
    MissingPayload,

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("BER decode failed: {0}")]
    Ber(#[from] BerError),
}

/// A timestamp that does not match the expected layout.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// Not `YYYYMMDDHHMMSS[.ffffff]Z`.
    #[error("invalid timestamp {value:?}: expected YYYYMMDDHHMMSS[.ffffff]Z")]
    Layout { value: String },

    #[error("invalid timestamp {value:?}: {source}")]
    Parse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl TimestampError {
    /// The rejected input.
    pub fn value(&self) -> &str {
        match self {
            TimestampError::Layout { value } | TimestampError::Parse { value, .. } => value,
        }
    }
}
