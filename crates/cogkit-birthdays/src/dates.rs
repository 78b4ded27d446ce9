//! Year-less date handling for birthday buckets.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Parse `MM-DD` into a date in year 1. Year 1 is not a leap year, so
/// February 29th is rejected.
pub fn parse_birthday(input: &str) -> Option<NaiveDate> {
    let (month, day) = input.trim().split_once('-')?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(1, month, day)
}

/// Proleptic ordinal used as the storage bucket id.
pub fn ordinal(date: NaiveDate) -> i32 {
    date.num_days_from_ce()
}

pub fn date_from_ordinal(ordinal: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(ordinal)
}

/// Today's bucket ordinal in UTC.
pub fn today_ordinal(now: DateTime<Utc>) -> Option<i32> {
    let date = now.date_naive();
    NaiveDate::from_ymd_opt(1, date.month(), date.day()).map(ordinal)
}

/// Time left until the next UTC midnight.
pub fn until_next_utc_midnight(now: DateTime<Utc>) -> Duration {
    let tomorrow = now.date_naive() + chrono::Days::new(1);
    let midnight = Utc.from_utc_datetime(&tomorrow.and_time(chrono::NaiveTime::MIN));
    (midnight - now).to_std().unwrap_or(Duration::ZERO)
}

/// Human date like `March 5`, without zero padding.
pub fn display_date(date: NaiveDate) -> String {
    format!("{} {}", date.format("%B"), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_dates() {
        let d = parse_birthday("03-05").unwrap();
        assert_eq!((d.month(), d.day()), (3, 5));
        assert_eq!(display_date(d), "March 5");
        // Unpadded input is accepted too.
        assert!(parse_birthday("3-5").is_some());
    }

    #[test]
    fn rejects_nonsense() {
        assert!(parse_birthday("13-01").is_none());
        assert!(parse_birthday("02-30").is_none());
        assert!(parse_birthday("02-29").is_none());
        assert!(parse_birthday("birthday").is_none());
        assert!(parse_birthday("").is_none());
    }

    #[test]
    fn ordinal_roundtrip() {
        let d = parse_birthday("12-31").unwrap();
        assert_eq!(date_from_ordinal(ordinal(d)), Some(d));
        // January 1st of year 1 is day one of the proleptic calendar.
        assert_eq!(ordinal(parse_birthday("01-01").unwrap()), 1);
    }

    #[test]
    fn midnight_wait_is_under_a_day() {
        let wait = until_next_utc_midnight(Utc::now());
        assert!(wait <= Duration::from_secs(86_400));
    }
}
