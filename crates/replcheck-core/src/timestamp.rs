//! Timestamp parsing.
//!
//! Two renderings appear in a backing store:
//! - LDAP generalized time inside replication controls (`20240101120000.000000Z`)
//! - `modify_timestamp` columns as rendered by the SQL engine

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::TimestampError;

/// Generalized time, fraction optional.
const GENERALIZED_TIME: &str = "%Y%m%d%H%M%S%.fZ";

/// Column renderings accepted for `modify_timestamp`, tried in order.
const ENTRY_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d-%H.%M.%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Entry renderings carrying a UTC offset (`timestamptz::text`).
const ENTRY_FORMATS_TZ: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Check the fixed `YYYYMMDDHHMMSS[.f{1,6}]Z` layout. chrono alone accepts
/// short numeric fields.
fn is_generalized_layout(value: &str) -> bool {
    let Some(body) = value.strip_suffix('Z') else {
        return false;
    };
    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if digits.len() != 14 || !all_digits(digits) {
        return false;
    }
    fraction.map_or(true, |f| (1..=6).contains(&f.len()) && all_digits(f))
}

/// Parse an LDAP generalized time such as `20240101120000.000000Z`.
pub fn parse_generalized_time(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = value.trim();
    if !is_generalized_layout(trimmed) {
        return Err(TimestampError::Layout {
            value: value.to_string(),
        });
    }

    NaiveDateTime::parse_from_str(trimmed, GENERALIZED_TIME)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|source| TimestampError::Parse {
            value: value.to_string(),
            source,
        })
}

/// Parse a `modify_timestamp` column value. Values without an offset are UTC.
///
/// Generalized time is accepted as a last resort.
pub fn parse_entry_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = value.trim();

    for format in ENTRY_FORMATS_TZ {
        if let Ok(parsed) = DateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }
    for format in ENTRY_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    parse_generalized_time(value)
}
