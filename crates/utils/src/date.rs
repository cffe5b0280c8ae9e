//! Calendar-day keys. Two instants are "the same day" exactly when their keys match.

use chrono::{Duration, NaiveDate};

/// Formats a date as its canonical `YYYY-MM-DD` key.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses a `YYYY-MM-DD` key back into a date.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()
}

/// The calendar day before `date`.
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_key_is_zero_padded() {
        assert_eq!(date_key(day(2024, 1, 5)), "2024-01-05");
    }

    #[test]
    fn parse_round_trips() {
        let date = day(2024, 12, 31);
        assert_eq!(parse_date_key(&date_key(date)), Some(date));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_date_key("not-a-date"), None);
        assert_eq!(parse_date_key("2024-13-01"), None);
        assert_eq!(parse_date_key(""), None);
    }

    #[test]
    fn previous_day_crosses_month_and_year_boundaries() {
        assert_eq!(previous_day(day(2024, 3, 1)), day(2024, 2, 29));
        assert_eq!(previous_day(day(2024, 1, 1)), day(2023, 12, 31));
    }
}
