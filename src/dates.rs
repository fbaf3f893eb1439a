//! Date string formats shared with the other platforms' encoders.
//!
//! - timestamp: `yyyy-MM-dd'T'HH:mm:ss.SSS±HH:mm`
//! - date: `yyyy-MM-dd`
//! - time: `HH:mm:ss.SSS` (fraction optional when parsing)
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, ParseResult};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S%.3f";

pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses the canonical format, falling back to RFC 3339 (`Z` suffix etc).
pub fn parse_timestamp(src: &str) -> ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_str(src, TIMESTAMP_FORMAT).or_else(|_| DateTime::parse_from_rfc3339(src))
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(src: &str) -> ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(src, DATE_FORMAT)
}

pub fn format_time(time: &NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_time(src: &str) -> ParseResult<NaiveTime> {
    NaiveTime::parse_from_str(src, TIME_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn timestamp_keeps_millis_and_offset() {
        let ts = parse_timestamp("2024-03-09T14:05:07.250-08:00").unwrap();
        assert_eq!(ts.offset().local_minus_utc(), -8 * 3600);
        assert_eq!(format_timestamp(&ts), "2024-03-09T14:05:07.250-08:00");
    }

    #[test]
    fn timestamp_accepts_rfc3339_zulu() {
        let ts = parse_timestamp("2024-03-09T14:05:07Z").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-09T14:05:07.000+00:00");
    }

    #[test]
    fn date_and_time_formats() {
        let date = parse_date("2023-12-31").unwrap();
        assert_eq!(format_date(&date), "2023-12-31");

        let time = parse_time("08:15:00").unwrap();
        assert_eq!(time.hour(), 8);
        assert_eq!(format_time(&time), "08:15:00.000");
        assert!(parse_time("8 o'clock").is_err());
    }
}
