//! crates/progress_journal_core/src/period.rs
//!
//! Period keys are human-readable "Month Year" labels (e.g. "July 2024").
//! All parsing of those labels lives here so that ordering rules have a
//! single home and can be tested on their own.

use chrono::{DateTime, Month, NaiveDate, TimeZone};
use std::cmp::Ordering;

/// Formats a timestamp as its period label, using the timestamp's own offset.
pub fn format_period_key<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    at.date_naive().format("%B %Y").to_string()
}

/// Parses a "Month Year" label into the first day of that month.
///
/// Accepts full or three-letter month names in any case. Returns `None` for
/// anything else.
pub fn parse_period_key(key: &str) -> Option<NaiveDate> {
    let mut parts = key.split_whitespace();
    let month: Month = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.number_from_month(), 1)
}

/// Orders period keys by the calendar month they name.
///
/// Labels that fail to parse sort before every valid label; ties (and two
/// unparseable labels) fall back to plain string order so the result is total.
pub fn compare_period_keys(a: &str, b: &str) -> Ordering {
    match (parse_period_key(a), parse_period_key(b)) {
        (Some(da), Some(db)) => da.cmp(&db).then_with(|| a.cmp(b)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn formats_full_month_name_and_year() {
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 7, 31, 23, 0, 0)
            .unwrap();
        assert_eq!(format_period_key(&at), "July 2024");
    }

    #[test]
    fn formatting_uses_the_local_offset_not_utc() {
        // 23:30 on Dec 31 at UTC-5 is already January in UTC.
        let at = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 12, 31, 23, 30, 0)
            .unwrap();
        assert_eq!(format_period_key(&at), "December 2023");
    }

    #[test]
    fn parses_round_trip_of_formatted_keys() {
        assert_eq!(parse_period_key("February 2024"), NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(parse_period_key("sep 2021"), NaiveDate::from_ymd_opt(2021, 9, 1));
        assert_eq!(parse_period_key("  March   1999 "), NaiveDate::from_ymd_opt(1999, 3, 1));
    }

    #[test]
    fn rejects_malformed_keys() {
        assert_eq!(parse_period_key(""), None);
        assert_eq!(parse_period_key("2024"), None);
        assert_eq!(parse_period_key("Smarch 2024"), None);
        assert_eq!(parse_period_key("July twenty"), None);
        assert_eq!(parse_period_key("July 2024 extra"), None);
    }

    #[test]
    fn compares_by_calendar_not_by_string() {
        // String order would put "April" before "January".
        assert_eq!(compare_period_keys("January 2024", "April 2024"), Ordering::Less);
        assert_eq!(compare_period_keys("December 2023", "January 2024"), Ordering::Less);
        assert_eq!(compare_period_keys("May 2024", "May 2024"), Ordering::Equal);
    }

    #[test]
    fn unparseable_keys_sort_first() {
        assert_eq!(compare_period_keys("garbage", "January 1970"), Ordering::Less);
        assert_eq!(compare_period_keys("June 2020", "???"), Ordering::Greater);
        assert_eq!(compare_period_keys("a", "b"), Ordering::Less);
    }
}
