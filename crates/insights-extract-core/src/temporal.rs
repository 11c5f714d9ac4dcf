//! Calendar-date and timestamp helpers.
//!
//! [`TargetDate`] is the single calendar day a run extracts. The remaining
//! helpers convert raw Arrow temporal values into `chrono` types so the
//! filter and the row renderer agree on how a stored value maps to a day and
//! to its ISO-8601 text.

use std::{fmt, str::FromStr};

use arrow::{
    array::timezone::Tz,
    datatypes::TimeUnit,
    temporal_conversions::{
        timestamp_ms_to_datetime, timestamp_ns_to_datetime, timestamp_s_to_datetime,
        timestamp_us_to_datetime,
    },
};
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};
use snafu::prelude::*;

/// Text format of a calendar date everywhere in the pipeline.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Accepted formats for timestamps stored as text. Fractional seconds are optional.
const TEXT_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Errors produced when parsing a `YYYY-MM-DD` target date.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseTargetDateError {
    /// The input was empty or only whitespace.
    #[snafu(display("target date is empty"))]
    Empty,

    /// The input is not a valid `YYYY-MM-DD` calendar date.
    #[snafu(display("invalid target date '{input}' (expected YYYY-MM-DD): {source}"))]
    Invalid {
        /// The original input string.
        input: String,
        /// The chrono parse error.
        source: chrono::ParseError,
    },
}

/// The calendar date rows are filtered against.
///
/// Displays and serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetDate(NaiveDate);

impl TargetDate {
    /// The day before `today`, which is what the daily job extracts.
    ///
    /// Returns `None` only at the lower bound of chrono's date range.
    pub fn day_before(today: NaiveDate) -> Option<Self> {
        today.pred_opt().map(TargetDate)
    }

    /// The underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl FromStr for TargetDate {
    type Err = ParseTargetDateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseTargetDateError::Empty);
        }

        NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
            .map(TargetDate)
            .context(InvalidSnafu {
                input: trimmed.to_string(),
            })
    }
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl Serialize for TargetDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Convert a raw timestamp value in `unit` since the Unix epoch to a naive UTC datetime.
pub(crate) fn naive_from_raw(unit: TimeUnit, value: i64) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Second => timestamp_s_to_datetime(value),
        TimeUnit::Millisecond => timestamp_ms_to_datetime(value),
        TimeUnit::Microsecond => timestamp_us_to_datetime(value),
        TimeUnit::Nanosecond => timestamp_ns_to_datetime(value),
    }
}

/// Calendar day of a UTC instant, observed in `tz` when one is attached.
pub(crate) fn calendar_date(utc: NaiveDateTime, tz: Option<&Tz>) -> NaiveDate {
    match tz {
        Some(tz) => Utc.from_utc_datetime(&utc).with_timezone(tz).date_naive(),
        None => utc.date(),
    }
}

/// ISO-8601 text for a stored timestamp.
///
/// Naive values render without an offset (`2024-03-10T08:15:00`); values with
/// a timezone render in that zone with an explicit offset
/// (`2024-03-10T09:15:00+01:00`). Fractional seconds appear only when non-zero.
pub(crate) fn iso_timestamp(utc: NaiveDateTime, tz: Option<&Tz>) -> String {
    match tz {
        Some(tz) => Utc
            .from_utc_datetime(&utc)
            .with_timezone(tz)
            .fixed_offset()
            .to_rfc3339_opts(SecondsFormat::AutoSi, false),
        None => utc.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
    }
}

/// Parse a timestamp stored as text; malformed values yield `None`.
pub(crate) fn parse_text_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TEXT_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").expect("valid datetime")
    }

    #[test]
    fn target_date_parses_and_displays() {
        let d: TargetDate = "2024-03-10".parse().unwrap();
        assert_eq!(d.to_string(), "2024-03-10");
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2024-03-10\"");

        let d: TargetDate = "  2024-03-10 ".parse().unwrap();
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn target_date_rejects_bad_input() {
        assert_eq!("".parse::<TargetDate>(), Err(ParseTargetDateError::Empty));
        assert!(matches!(
            "2024-13-01".parse::<TargetDate>(),
            Err(ParseTargetDateError::Invalid { .. })
        ));
        assert!(matches!(
            "10/03/2024".parse::<TargetDate>(),
            Err(ParseTargetDateError::Invalid { .. })
        ));
    }

    #[test]
    fn day_before_crosses_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d = TargetDate::day_before(today).unwrap();
        assert_eq!(d.to_string(), "2024-02-29");
    }

    #[test]
    fn text_timestamps_accept_optional_fraction() {
        assert_eq!(
            parse_text_timestamp("2024-03-10 08:15:00"),
            Some(naive("2024-03-10 08:15:00"))
        );
        assert_eq!(
            parse_text_timestamp("2024-03-10 08:15:00.250"),
            Some(naive("2024-03-10 08:15:00.250"))
        );
        assert_eq!(
            parse_text_timestamp("2024-03-10T23:59:59.123456"),
            Some(naive("2024-03-10 23:59:59.123456"))
        );
        assert_eq!(parse_text_timestamp("not a date"), None);
        assert_eq!(parse_text_timestamp("2024-03-10"), None);
    }

    #[test]
    fn raw_values_respect_unit() {
        let expected = naive("2024-03-10 00:00:01");
        assert_eq!(naive_from_raw(TimeUnit::Second, 1_710_028_801), Some(expected));
        assert_eq!(
            naive_from_raw(TimeUnit::Millisecond, 1_710_028_801_000),
            Some(expected)
        );
        assert_eq!(
            naive_from_raw(TimeUnit::Nanosecond, 1_710_028_801_000_000_000),
            Some(expected)
        );
    }

    #[test]
    fn calendar_date_applies_timezone() {
        let utc = naive("2024-03-09 23:30:00");
        assert_eq!(calendar_date(utc, None).to_string(), "2024-03-09");

        let tz: Tz = "+01:00".parse().unwrap();
        assert_eq!(calendar_date(utc, Some(&tz)).to_string(), "2024-03-10");
    }

    #[test]
    fn iso_rendering_round_trips() {
        let utc = naive("2024-03-10 08:15:00");
        assert_eq!(iso_timestamp(utc, None), "2024-03-10T08:15:00");

        let frac = naive("2024-03-10 08:15:00.5");
        let text = iso_timestamp(frac, None);
        assert_eq!(text, "2024-03-10T08:15:00.500");
        assert_eq!(parse_text_timestamp(&text), Some(frac));

        let tz: Tz = "+01:00".parse().unwrap();
        assert_eq!(iso_timestamp(utc, Some(&tz)), "2024-03-10T09:15:00+01:00");
    }
}
