//! Timestamp normalization.
//!
//! Fleet data mixes `...Z`, explicit offsets and offset-less timestamps. Every
//! value is turned into a timezone-aware instant; offset-less values are taken
//! as UTC, never left naive.
//!
//! Parsing order:
//! 1. surrounding whitespace is trimmed and a trailing `Z` or `z` becomes `+00:00`
//! 2. an hour-only offset (`+02`) becomes `+02:00`, an hour-only time (`T10`) becomes `T10:00`
//! 3. ISO-8601 with an offset (`T` or space separator, optional fraction)
//! 4. ISO-8601 without an offset, or a bare date, as UTC
//! 5. the first 19 characters as `YYYY-MM-DDTHH:MM:SS`, as UTC
//!
//! Anything else is [`LogbookError::InvalidTimestamp`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{LogbookError, Result};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const FALLBACK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const FALLBACK_LEN: usize = 19;

/// Parse a raw timestamp into a timezone-aware instant.
///
/// `None` or an empty string is an absent timestamp, not an error.
///
/// # Example
/// ```
/// use zone_logbook::parse_timestamp;
///
/// let utc = parse_timestamp(Some("2024-03-01T08:00:00Z")).unwrap().unwrap();
/// let naive = parse_timestamp(Some("2024-03-01T08:00:00")).unwrap().unwrap();
/// let local = parse_timestamp(Some("2024-03-01T10:00:00+02:00")).unwrap().unwrap();
///
/// assert_eq!(utc, naive);
/// assert_eq!(utc, local);
/// assert!(parse_timestamp(None).unwrap().is_none());
/// assert!(parse_timestamp(Some("soon")).is_err());
/// ```
pub fn parse_timestamp(raw: Option<&str>) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(stem) => format!("{stem}+00:00"),
        None => raw.to_string(),
    };
    let normalized = expand_hour_precision(expand_hour_offset(normalized));

    if let Some(parsed) = parse_iso(&normalized) {
        return Ok(Some(parsed));
    }

    parse_fallback(raw)
        .map(Some)
        .ok_or_else(|| LogbookError::invalid_timestamp(raw))
}

// Offsets and times only ever start after the 10-byte date
const DATE_LEN: usize = 10;

/// `...+02` to `...+02:00`.
fn expand_hour_offset(mut value: String) -> String {
    let bytes = value.as_bytes();
    let len = bytes.len();
    if len >= DATE_LEN + 4
        && matches!(bytes[len - 3], b'+' | b'-')
        && bytes[len - 2..].iter().all(u8::is_ascii_digit)
        && bytes[len - 4].is_ascii_digit()
    {
        value.push_str(":00");
    }
    value
}

/// `YYYY-MM-DDTHH` (optionally followed by an offset) to `YYYY-MM-DDTHH:00`.
fn expand_hour_precision(value: String) -> String {
    let bytes = value.as_bytes();
    let hour_end = DATE_LEN + 3;
    let is_hour_only = bytes.len() >= hour_end
        && matches!(bytes[DATE_LEN], b'T' | b' ')
        && bytes[DATE_LEN + 1..hour_end].iter().all(u8::is_ascii_digit)
        && bytes.get(hour_end).map_or(true, |&b| matches!(b, b'+' | b'-'));

    if !is_hour_only {
        return value;
    }
    format!("{}:00{}", &value[..hour_end], &value[hour_end..])
}

fn parse_iso(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }

    if let Some(parsed) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(value, fmt).ok())
    {
        return Some(parsed);
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    {
        return Some(assume_utc(naive));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(assume_utc)
}

fn parse_fallback(raw: &str) -> Option<DateTime<FixedOffset>> {
    let head = match raw.char_indices().nth(FALLBACK_LEN) {
        Some((byte_index, _)) => &raw[..byte_index],
        None => raw,
    };

    NaiveDateTime::parse_from_str(head, FALLBACK_FORMAT)
        .ok()
        .map(assume_utc)
}

fn assume_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&naive).fixed_offset()
}
