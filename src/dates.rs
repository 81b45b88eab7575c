//! Day-granular date helpers.
//!
//! Snapshots are keyed by `%Y-%m-%d` day strings in UTC; the helpers here
//! are the only place those strings are produced.

use chrono::{Duration, NaiveDate, Utc};

pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Today as a day key.
pub fn today() -> String {
    Utc::now().format(DAY_FORMAT).to_string()
}

/// `n` days before today as a day key.
pub fn days_ago(n: i64) -> String {
    (Utc::now() - Duration::days(n)).format(DAY_FORMAT).to_string()
}

pub fn yesterday() -> String {
    days_ago(1)
}

/// Every calendar day from `from` up to and including today.
pub fn days_since(from: NaiveDate) -> Vec<NaiveDate> {
    let end = Utc::now().date_naive();
    let mut days = Vec::new();
    let mut d = from;
    while d <= end {
        days.push(d);
        d = d + Duration::days(1);
    }
    days
}

/// Epoch-second bounds of yesterday, as the half-open window
/// [start-of-yesterday, end-of-yesterday).
pub fn yesterday_bounds() -> (i64, i64) {
    let start_of_today = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        .and_utc()
        .timestamp();
    (start_of_today - 86_400, start_of_today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_since_includes_both_ends() {
        let from = Utc::now().date_naive() - Duration::days(3);
        let days = days_since(from);
        assert_eq!(days.len(), 4);
        assert_eq!(days[0], from);
        assert_eq!(*days.last().unwrap(), Utc::now().date_naive());
    }

    #[test]
    fn test_days_since_future_start_is_empty() {
        let from = Utc::now().date_naive() + Duration::days(1);
        assert!(days_since(from).is_empty());
    }

    #[test]
    fn test_yesterday_bounds_cover_one_day() {
        let (start, end) = yesterday_bounds();
        assert_eq!(end - start, 86_400);
        assert!(end <= Utc::now().timestamp());
    }

    #[test]
    fn test_day_keys_are_iso_formatted() {
        let day = today();
        assert_eq!(day.len(), 10);
        assert!(NaiveDate::parse_from_str(&day, DAY_FORMAT).is_ok());
        assert_ne!(today(), days_ago(1));
    }
}
