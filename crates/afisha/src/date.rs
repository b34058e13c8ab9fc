//! Conversion of the site's Russian date captions into calendar dates.
//!
//! Captions look like `"пт 17 октября"`, `"сб 1, ноября"` or one of the
//! relative words `"сегодня"` / `"завтра"`. The site never prints a year, so
//! the current one is assumed, even for dates that already passed.

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::parser::ParseError;

pub const TODAY: &str = "сегодня";
pub const TOMORROW: &str = "завтра";

/// Caption the site shows while an event has no fixed date.
pub const DATE_PENDING: &str = "Дата уточняется";

/// Month names in the genitive case, as they follow a day number.
pub const MONTHS: [(&str, u32); 12] = [
    ("января", 1),
    ("февраля", 2),
    ("марта", 3),
    ("апреля", 4),
    ("мая", 5),
    ("июня", 6),
    ("июля", 7),
    ("августа", 8),
    ("сентября", 9),
    ("октября", 10),
    ("ноября", 11),
    ("декабря", 12),
];

const WEEKDAYS_SHORT: [&str; 7] = ["пн", "вт", "ср", "чт", "пт", "сб", "вс"];

fn strip_comma(token: &str) -> &str {
    token.trim_end_matches(',')
}

pub fn month_number(name: &str) -> Option<u32> {
    let name = strip_comma(name).to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, number)| *number)
}

/// Genitive month name for `1..=12`.
pub fn month_name(number: u32) -> Option<&'static str> {
    MONTHS
        .iter()
        .find(|(_, n)| *n == number)
        .map(|(name, _)| *name)
}

pub fn weekday_short(weekday: Weekday) -> &'static str {
    WEEKDAYS_SHORT[weekday.num_days_from_monday() as usize]
}

pub fn is_pending(text: &str) -> bool {
    text.contains(DATE_PENDING)
}

/// Normalizes a date caption relative to `today`.
pub fn normalize_date(text: &str, today: NaiveDate) -> Result<NaiveDate, ParseError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let first = tokens
        .first()
        .map(|t| strip_comma(t).to_lowercase())
        .ok_or_else(|| ParseError::DateParse("Empty date text".to_string()))?;

    if first == TODAY {
        return Ok(today);
    }
    if first == TOMORROW {
        return today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| ParseError::DateParse(format!("No day after {}", today)));
    }

    let (day_token, month_token) = match tokens.as_slice() {
        [_, day, month, ..] => (strip_comma(day), *month),
        _ => {
            return Err(ParseError::DateParse(format!(
                "Expected '<weekday> <day> <month>': {}",
                text
            )));
        }
    };

    let day: u32 = day_token
        .parse()
        .map_err(|_| ParseError::DateParse(format!("Invalid day: {}", day_token)))?;
    let month = month_number(month_token)
        .ok_or_else(|| ParseError::DateParse(format!("Unknown month: {}", month_token)))?;
    let year = today.year();

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ParseError::DateParse(format!("Invalid date: {}-{:02}-{:02}", year, month, day))
    })
}
