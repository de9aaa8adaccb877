// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calendar parsing for trigger matching: HH:MM times, `25-Dec` style
//! day-of-year dates, and weekday names.

use chrono::{NaiveDate, NaiveTime, Weekday};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeError {
    #[error("invalid time (expected HH:MM): {0:?}")]
    BadTime(String),
    #[error("invalid date (expected DD-Mon, e.g. 25-Dec): {0:?}")]
    BadDate(String),
    #[error("unknown weekday: {0:?}")]
    BadWeekday(String),
}

/// Parse `HH:MM` into a time of day.
pub fn parse_hhmm(input: &str) -> Result<NaiveTime, TimeError> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M")
        .map_err(|_| TimeError::BadTime(input.to_string()))
}

/// A literal day-of-year such as `25-Dec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOfYear {
    pub day: u32,
    pub month: u32,
}

impl DayOfYear {
    pub fn matches(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        date.day() == self.day && date.month() == self.month
    }
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse `DD-Mon` (e.g. `25-Dec`, `1-Jan`).
pub fn parse_day_of_year(input: &str) -> Result<DayOfYear, TimeError> {
    let bad = || TimeError::BadDate(input.to_string());
    let (day_str, mon_str) = input.trim().split_once('-').ok_or_else(bad)?;
    let day: u32 = day_str.trim().parse().map_err(|_| bad())?;
    if !(1..=31).contains(&day) {
        return Err(bad());
    }
    let mon_lower = mon_str.trim().to_lowercase();
    let month = MONTHS
        .iter()
        .position(|m| mon_lower.starts_with(m))
        .ok_or_else(bad)? as u32
        + 1;
    Ok(DayOfYear { day, month })
}

/// Parse a weekday name; full (`Monday`) and three-letter (`Mon`) forms,
/// case-insensitive.
pub fn parse_weekday(input: &str) -> Result<Weekday, TimeError> {
    match input.trim().to_lowercase().as_str() {
        "monday" | "mon" => Ok(Weekday::Mon),
        "tuesday" | "tue" => Ok(Weekday::Tue),
        "wednesday" | "wed" => Ok(Weekday::Wed),
        "thursday" | "thu" => Ok(Weekday::Thu),
        "friday" | "fri" => Ok(Weekday::Fri),
        "saturday" | "sat" => Ok(Weekday::Sat),
        "sunday" | "sun" => Ok(Weekday::Sun),
        _ => Err(TimeError::BadWeekday(input.to_string())),
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
