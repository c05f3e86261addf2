//! Date/time utilities.
//!
//! Timestamps are stored in SQLite as UTC text (`YYYY-MM-DD HH:MM:SS`).

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

/// SQLite storage format.
pub const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a stored datetime string in the given timezone.
///
/// Returns the original string if either the timezone or the datetime
/// cannot be parsed.
pub fn format_datetime(datetime_str: &str, timezone: &str, format: &str) -> String {
    let tz: Tz = match timezone.parse() {
        Ok(tz) => tz,
        Err(_) => return datetime_str.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(datetime_str) {
        return dt.with_timezone(&tz).format(format).to_string();
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(datetime_str, SQLITE_FORMAT) {
        return naive.and_utc().with_timezone(&tz).format(format).to_string();
    }

    datetime_str.to_string()
}

/// Convert a database datetime string to RFC3339.
pub fn to_rfc3339(datetime_str: &str) -> String {
    format!("{}Z", datetime_str.replace(' ', "T"))
}

/// Render a UTC instant in the SQLite storage format.
pub fn to_sqlite(dt: &DateTime<Utc>) -> String {
    dt.format(SQLITE_FORMAT).to_string()
}

/// Storage-format timestamp `secs` seconds from now.
pub fn sqlite_after_secs(secs: u64) -> String {
    to_sqlite(&(Utc::now() + Duration::seconds(secs as i64)))
}

/// Parse a search bound given as `YYYY-MM-DD` or RFC3339.
///
/// A bare date expands to the start of the day for a lower bound and to the
/// last second of the day for an upper bound, so both bounds are inclusive.
pub fn parse_search_bound(input: &str, upper: bool) -> Option<String> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(to_sqlite(&dt.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    let time = if upper {
        date.and_hms_opt(23, 59, 59)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(time.format(SQLITE_FORMAT).to_string())
}
