use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::ReportError;

/// ASCII digits only: the offset is split by byte index below.
fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<base>[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2})(?:\.(?P<frac>[0-9]+))?(?P<tz>[Zz]|[+-][0-9]{2}:?[0-9]{2})?$",
        )
        .expect("timestamp pattern is a valid regex")
    })
}

/// Parse a result-file timestamp into UTC.
///
/// k6 writes nanosecond fractions (`2024-05-01T10:00:00.123456789+03:00`).
/// The fraction is truncated or zero-padded to exactly six digits before
/// parsing. Both `Z` and numeric offsets (with or without a colon) are
/// accepted; a timestamp with no offset at all is read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ReportError> {
    let trimmed = raw.trim();
    let caps = timestamp_pattern()
        .captures(trimmed)
        .ok_or_else(|| ReportError::InvalidTimestamp(raw.to_string()))?;

    let base = caps["base"].replacen(' ', "T", 1);
    let micros = match caps.name("frac") {
        Some(frac) => {
            let digits: String = frac.as_str().chars().take(6).collect();
            format!("{digits:0<6}")
        }
        None => "000000".to_string(),
    };
    let offset = match caps.name("tz").map(|m| m.as_str()) {
        None | Some("Z") | Some("z") => "+00:00".to_string(),
        Some(tz) if tz.contains(':') => tz.to_string(),
        Some(tz) => format!("{}:{}", &tz[..3], &tz[3..]),
    };

    let normalized = format!("{base}.{micros}{offset}");
    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ReportError::InvalidTimestamp(format!("{raw}: {e}")))
}
