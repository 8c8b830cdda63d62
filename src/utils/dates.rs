// The `dates` module turns the free-form dates a model produces
// ("Feb 11th 2026", "yesterday", "2026-02-11") into calendar dates.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    #[error("Empty date")]
    Empty,
    #[error("Unrecognized date: {0:?}")]
    Unrecognized(String),
    #[error("Date out of range: {0:?}")]
    OutOfRange(String),
}

const MONTHS: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

const WEEKDAYS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

const FILLER: [&str; 4] = ["on", "of", "the", "at"];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const NUMERIC_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%Y.%m.%d"];

/// Parses a natural-language date relative to `today`.
///
/// Numeric dates are read month first (`02/11/2026` is February 11th). A
/// month-name date without a year falls in the year of `today`; one without
/// a day takes the day of `today`, clamped to the length of the month. A
/// trailing time of day ("10am", "10:30", "at 9 pm") is ignored.
pub fn parse_natural_date(input: &str, today: NaiveDate) -> Result<NaiveDate, DateParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }
    let lowered = trimmed.to_lowercase();

    match lowered.as_str() {
        "today" | "now" => return Ok(today),
        "yesterday" => {
            return today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| DateParseError::OutOfRange(trimmed.to_string()));
        }
        "tomorrow" => {
            return today
                .checked_add_days(Days::new(1))
                .ok_or_else(|| DateParseError::OutOfRange(trimmed.to_string()));
        }
        _ => {}
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    if let Some(timestamp) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
    {
        return Ok(timestamp.date());
    }
    if let Some(date) = parse_numeric(trimmed) {
        return Ok(date);
    }
    // "2026-02-12 10am", "02/12/2026 at 9:30"
    if let Some((head, rest)) = lowered.split_once(char::is_whitespace) {
        if is_time_suffix(rest) {
            if let Some(date) = parse_numeric(head) {
                return Ok(date);
            }
        }
    }

    parse_words(&lowered, today)
        .ok_or_else(|| DateParseError::Unrecognized(trimmed.to_string()))
}

fn parse_numeric(input: &str) -> Option<NaiveDate> {
    NUMERIC_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
}

fn is_meridiem(token: &str) -> bool {
    matches!(token, "am" | "pm" | "a.m." | "p.m.")
}

/// "10:30", "10am", "9:15pm". A bare number is not a time.
fn is_clock_time(token: &str) -> bool {
    let (digits, meridiem) = match token
        .strip_suffix("am")
        .or_else(|| token.strip_suffix("pm"))
    {
        Some(rest) => (rest, true),
        None => (token, false),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == ':') {
        return false;
    }
    let mut fields = digits.split(':');
    let hour_ok = fields
        .next()
        .is_some_and(|h| (1..=2).contains(&h.len()) && h.parse::<u32>().is_ok_and(|h| h < 24));
    let rest: Vec<&str> = fields.collect();
    let minutes_ok = rest
        .iter()
        .all(|f| f.len() == 2 && f.parse::<u32>().is_ok_and(|m| m < 60));
    hour_ok && minutes_ok && rest.len() <= 2 && (meridiem || !rest.is_empty())
}

fn is_time_suffix(rest: &str) -> bool {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let mut seen_time = false;
    for (i, token) in tokens.iter().enumerate() {
        if *token == "at" {
            continue;
        }
        if is_clock_time(token) {
            seen_time = true;
        } else if is_meridiem(token) && i > 0 && tokens[i - 1].chars().all(|c| c.is_ascii_digit()) {
            seen_time = true;
        } else if !(token.chars().all(|c| c.is_ascii_digit())
            && tokens.get(i + 1).is_some_and(|next| is_meridiem(next)))
        {
            return false;
        }
    }
    seen_time
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.trim_end_matches('.');
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .find(|(name, _)| name.starts_with(token))
        .map(|(_, number)| *number)
}

fn is_weekday(token: &str) -> bool {
    let token = token.trim_end_matches('.');
    token.len() >= 3 && WEEKDAYS.iter().any(|day| day.starts_with(token))
}

/// Strips an ordinal suffix: "11th" -> "11".
fn strip_ordinal(token: &str) -> &str {
    for suffix in ["st", "nd", "rd", "th"] {
        if let Some(number) = token.strip_suffix(suffix) {
            if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
                return number;
            }
        }
    }
    token
}

/// Month-name forms: "feb 11th 2026", "11 february 2026", "feb 11",
/// "feb 2026".
fn parse_words(lowered: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = lowered.replace([',', '-', '/'], " ");

    let mut month = None;
    let mut numbers: Vec<(u32, usize)> = Vec::new();
    let mut after_clock = false;
    for token in cleaned.split_whitespace() {
        if is_meridiem(token) {
            // "10 am": the number before it was an hour.
            if !after_clock {
                numbers.pop()?;
            }
            after_clock = false;
            continue;
        }
        after_clock = is_clock_time(token);
        if after_clock || FILLER.contains(&token) || is_weekday(token) {
            continue;
        }
        let token = strip_ordinal(token);
        if let Ok(number) = token.parse::<u32>() {
            numbers.push((number, token.len()));
        } else if let (None, Some(m)) = (month, month_number(token)) {
            month = Some(m);
        } else {
            return None;
        }
    }

    let month = month?;
    let (day, year) = match numbers.as_slice() {
        [(year, 4)] => {
            let year = i32::try_from(*year).ok()?;
            return (1..=today.day())
                .rev()
                .find_map(|day| NaiveDate::from_ymd_opt(year, month, day));
        }
        [(day, _)] => (*day, today.year()),
        [(a, a_len), (b, b_len)] => {
            if *a_len == 4 || *a > 31 {
                (*b, i32::try_from(*a).ok()?)
            } else if *b_len == 4 || *b > 31 {
                (*a, i32::try_from(*b).ok()?)
            } else {
                return None;
            }
        }
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_and_numeric_forms() {
        assert_eq!(parse_natural_date("2026-02-11", today()), Ok(ymd(2026, 2, 11)));
        assert_eq!(parse_natural_date("2026/02/11", today()), Ok(ymd(2026, 2, 11)));
        assert_eq!(parse_natural_date("02/11/2026", today()), Ok(ymd(2026, 2, 11)));
        assert_eq!(
            parse_natural_date("2026-02-11T09:30:00+01:00", today()),
            Ok(ymd(2026, 2, 11))
        );
    }

    #[test]
    fn parses_month_name_forms() {
        for input in [
            "Feb 11th 2026",
            "February 11, 2026",
            "11 February 2026",
            "Wednesday, Feb 11 2026",
            "on the 11th of February 2026",
            "Feb. 11 2026",
        ] {
            assert_eq!(parse_natural_date(input, today()), Ok(ymd(2026, 2, 11)), "{input}");
        }
    }

    #[test]
    fn month_name_without_year_uses_current_year() {
        assert_eq!(parse_natural_date("Feb 12th", today()), Ok(ymd(2026, 2, 12)));
    }

    #[test]
    fn date_times_keep_the_date() {
        for input in [
            "2026-02-12 00:00:00",
            "2026-02-12T00:00:00",
            "2026-02-12T18:45:10.250",
            "2026-02-12 10:00",
            "2026-02-12 10am",
            "02/12/2026 at 9:30",
            "2026-02-12 at 9 pm",
        ] {
            assert_eq!(parse_natural_date(input, today()), Ok(ymd(2026, 2, 12)), "{input}");
        }
    }

    #[test]
    fn trailing_time_of_day_is_ignored() {
        for input in [
            "February 12, 2026 at 10am",
            "Feb 12th 2026 10:30",
            "Thursday February 12th 2026 at 9:15 pm",
            "12 February 2026 at 10 a.m.",
        ] {
            assert_eq!(parse_natural_date(input, today()), Ok(ymd(2026, 2, 12)), "{input}");
        }
    }

    #[test]
    fn month_and_year_take_the_current_day() {
        let mid_month = ymd(2026, 3, 17);
        assert_eq!(parse_natural_date("Feb 2026", mid_month), Ok(ymd(2026, 2, 17)));
        assert_eq!(parse_natural_date("February 2026", today()), Ok(ymd(2026, 2, 1)));
        // Clamped to the end of a shorter month.
        assert_eq!(
            parse_natural_date("Feb 2026", ymd(2026, 1, 31)),
            Ok(ymd(2026, 2, 28))
        );
    }

    #[test]
    fn parses_relative_keywords() {
        assert_eq!(parse_natural_date("today", today()), Ok(today()));
        assert_eq!(parse_natural_date("Yesterday", today()), Ok(ymd(2026, 2, 28)));
        assert_eq!(parse_natural_date("tomorrow", today()), Ok(ymd(2026, 3, 2)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_natural_date("   ", today()), Err(DateParseError::Empty));
        assert!(matches!(
            parse_natural_date("next blue moon", today()),
            Err(DateParseError::Unrecognized(_))
        ));
        assert!(parse_natural_date("Feb 30 2026", today()).is_err());
        assert!(parse_natural_date("13/45/2026", today()).is_err());
        assert!(parse_natural_date("11 12 February", today()).is_err());
        assert!(parse_natural_date("2026-02-12 banana", today()).is_err());
        assert!(parse_natural_date("Feb 12 2026 at 25:00", today()).is_err());
    }
}
