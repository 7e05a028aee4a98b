//! Date/time helpers for voidmail.
//!
//! Timestamps are persisted as fixed-width UTC text
//! (`YYYY-MM-DD HH:MM:SS.ffffff`) so that string comparison in SQL matches
//! chronological order exactly.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Storage format for timestamps.
pub const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a UTC timestamp for storage.
pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// Accepts the storage format, plain SQLite `datetime()` output and RFC 3339.
pub fn from_db(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, DB_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a stored timestamp, falling back to the Unix epoch for garbage.
///
/// Used when mapping rows; an unreadable timestamp makes a mailbox look
/// expired rather than immortal.
pub fn from_db_or_epoch(s: &str) -> DateTime<Utc> {
    from_db(s).unwrap_or_default()
}

/// Whole seconds from `now` until `deadline`, clamped at zero.
pub fn remaining_seconds(deadline: &DateTime<Utc>, now: &DateTime<Utc>) -> i64 {
    (*deadline - *now).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_db_round_trip_keeps_microseconds() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap() + Duration::microseconds(42);
        let s = to_db(&dt);
        assert_eq!(s, "2024-01-15 10:30:00.000042");
        assert_eq!(from_db(&s), Some(dt));
    }

    #[test]
    fn test_db_format_orders_lexicographically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 15, 9, 59, 59).unwrap();
        let later = earlier + Duration::milliseconds(1);
        assert!(to_db(&earlier) < to_db(&later));
    }

    #[test]
    fn test_from_db_sqlite_format() {
        let dt = from_db("2024-01-15 10:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_from_db_or_epoch() {
        assert_eq!(from_db_or_epoch("garbage").timestamp(), 0);
    }

    #[test]
    fn test_remaining_seconds() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        assert_eq!(remaining_seconds(&(now + Duration::minutes(2)), &now), 120);
        assert_eq!(remaining_seconds(&(now - Duration::minutes(2)), &now), 0);
    }
}
