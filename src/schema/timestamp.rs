//! Mixed-format timestamp parsing
//!
//! Keystroke exports mix formats across rows (database dumps with `+00` offsets,
//! ISO 8601 with `T` and `Z`, naive local strings). Every row is tried against
//! the same ordered list of formats; naive values are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Offset-bearing formats. `%#z` accepts `+hh`, `+hhmm`, `+hh:mm` and `Z`.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f %#z",
    "%Y/%m/%d %H:%M:%S%.f%#z",
];

/// Offset-less formats, interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp in any supported format, keeping full sub-second precision.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(rest) = strip_utc_suffix(value) {
        return NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(rest, format).ok())
            .map(|naive| naive.and_utc());
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// `"2024-01-15 14:00:00 UTC"` → `"2024-01-15 14:00:00"`
fn strip_utc_suffix(value: &str) -> Option<&str> {
    let split = value.len().checked_sub(3)?;
    if !value.is_char_boundary(split) || !value[split..].eq_ignore_ascii_case("utc") {
        return None;
    }
    let rest = value[..split].trim_end();
    (!rest.is_empty()).then_some(rest)
}

/// Milliseconds since the Unix epoch, floored.
pub fn to_epoch_ms(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ms(value: &str) -> i64 {
        to_epoch_ms(&parse_timestamp(value).unwrap())
    }

    #[test]
    fn test_rfc3339_variants() {
        let expected = Utc
            .with_ymd_and_hms(2024, 1, 15, 14, 0, 0)
            .unwrap()
            .timestamp_millis()
            + 123;
        assert_eq!(ms("2024-01-15T14:00:00.123Z"), expected);
        assert_eq!(ms("2024-01-15T15:00:00.123+01:00"), expected);
    }

    #[test]
    fn test_database_style_offsets() {
        let base = ms("2024-01-15T14:00:00Z");
        assert_eq!(ms("2024-01-15 14:00:00+00"), base);
        assert_eq!(ms("2024-01-15 14:00:00.250+00"), base + 250);
        assert_eq!(ms("2024-01-15 16:00:00+02:00"), base);
    }

    #[test]
    fn test_utc_suffix() {
        let base = ms("2024-01-15T14:00:00Z");
        assert_eq!(ms("2024-01-15 14:00:00 UTC"), base);
        assert_eq!(ms("2024-01-15 14:00:00.250 UTC"), base + 250);
        assert_eq!(ms("2024-01-15T14:00:00UTC"), base);
        assert!(parse_timestamp("UTC").is_none());
        assert!(parse_timestamp("not a time UTC").is_none());
    }

    #[test]
    fn test_naive_values_are_utc() {
        let base = ms("2024-01-15T14:00:00Z");
        assert_eq!(ms("2024-01-15 14:00:00"), base);
        assert_eq!(ms("2024-01-15T14:00:00.5"), base + 500);
        assert_eq!(ms("2024/01/15 14:00:00"), base);
        assert_eq!(ms("01/15/2024 14:00:00"), base);
    }

    #[test]
    fn test_mixed_precision_rows_compare_in_ms() {
        // Seconds-resolution rows must upconvert, not truncate their neighbours.
        let coarse = ms("2024-01-15 14:00:01");
        let fine = ms("2024-01-15T14:00:00.950Z");
        assert_eq!(coarse - fine, 50);
    }

    #[test]
    fn test_sub_millisecond_precision_floors() {
        assert_eq!(
            ms("2024-01-15T14:00:00.123987Z"),
            ms("2024-01-15T14:00:00.123Z")
        );
    }

    #[test]
    fn test_date_only() {
        assert_eq!(ms("2024-01-15"), ms("2024-01-15T00:00:00Z"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("2024-13-45 99:00:00").is_none());
    }
}
