//! Lenient date parsing for heterogeneous source files

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

/// Formats carrying a time component, tried in order. `%.f` also accepts no fraction.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Date-only formats, tried in order after [`DATETIME_FORMATS`].
/// Month-first wins over day-first for ambiguous values.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y%m%d"];

/// Parses a timestamp or date; date-only input becomes midnight.
///
/// Returns `None` for blank or unrecognised input. Offsets (RFC 3339) are
/// dropped and the wall-clock time is kept.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }

    None
}

/// Calendar date of [`parse_datetime`]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}

/// ISO rendering used for cleaned files
pub fn format_iso(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
