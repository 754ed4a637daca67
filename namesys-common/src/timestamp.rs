//! RFC3339 timestamps carried in record validity fields.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

pub use chrono::ParseError;

/// Format an instant the way it is stored in a record's `validity`.
///
/// Always UTC with a `Z` suffix and only as many fractional digits as needed.
pub fn format_rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a record `validity` value.
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, ParseError> {
    DateTime::parse_from_rfc3339(value).map(|t| t.with_timezone(&Utc))
}

/// Parse raw `validity` bytes.
pub fn parse_rfc3339_bytes(value: &[u8]) -> Result<DateTime<Utc>, InvalidTimestamp> {
    let text = core::str::from_utf8(value).map_err(|_| InvalidTimestamp::NotUtf8)?;
    Ok(parse_rfc3339(text)?)
}

/// `time + duration`, saturating at the largest representable instant.
pub fn add_duration(time: &DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Time left until `eol`, zero if it has passed.
pub fn until(eol: &DateTime<Utc>, now: &DateTime<Utc>) -> Duration {
    (*eol - *now).to_std().unwrap_or(Duration::ZERO)
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Error parsing a record `validity` timestamp.
pub enum InvalidTimestamp {
    #[error("Timestamp is not valid UTF-8")]
    /// Not valid UTF-8
    NotUtf8,
    #[error(transparent)]
    /// Not RFC3339
    Parse(#[from] ParseError),
}
