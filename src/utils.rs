//! Timestamp helpers.
//!
//! Timestamps are stored as RFC 3339 text with a fixed microsecond width and a
//! `Z` suffix, so SQL string comparison orders them chronologically.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// A point in time supplied by a client: either a calendar day or an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInput {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl TimeInput {
    /// Parse `YYYY-MM-DD` or an RFC 3339 timestamp
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Some(TimeInput::Day(day));
        }
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| TimeInput::Instant(dt.with_timezone(&Utc)))
    }

    /// The instant itself, or midnight UTC for a day
    pub fn start(&self) -> DateTime<Utc> {
        match self {
            TimeInput::Day(day) => start_of_day(*day),
            TimeInput::Instant(dt) => *dt,
        }
    }

    /// Calendar day this input falls on (UTC)
    pub fn day(&self) -> NaiveDate {
        match self {
            TimeInput::Day(day) => *day,
            TimeInput::Instant(dt) => dt.date_naive(),
        }
    }
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Midnight UTC of the following day
pub fn start_of_next_day(day: NaiveDate) -> DateTime<Utc> {
    match day.succ_opt() {
        Some(next) => start_of_day(next),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Canonical storage form of a timestamp
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day() {
        let parsed = TimeInput::parse("2024-03-15").unwrap();
        assert_eq!(
            parsed,
            TimeInput::Day(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert_eq!(format_timestamp(parsed.start()), "2024-03-15T00:00:00.000000Z");
    }

    #[test]
    fn test_parse_instant_normalizes_to_utc() {
        let parsed = TimeInput::parse("2024-03-15T10:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(parsed.start()), "2024-03-15T08:30:00.000000Z");
        assert_eq!(parsed.day(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TimeInput::parse("yesterday").is_none());
        assert!(TimeInput::parse("2024-13-01").is_none());
        assert!(TimeInput::parse("").is_none());
    }

    #[test]
    fn test_next_day_crosses_month() {
        let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            format_timestamp(start_of_next_day(day)),
            "2024-03-01T00:00:00.000000Z"
        );
    }

    #[test]
    fn test_fixed_width_sorts_lexically() {
        let a = TimeInput::parse("2024-01-01T00:00:00.5Z").unwrap().start();
        let b = TimeInput::parse("2024-01-01T00:00:00.25Z").unwrap().start();
        assert!(format_timestamp(b) < format_timestamp(a));
    }
}
