// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule document validation.
//!
//! Schedules arrive as JSON. Deserialization gives structural validation;
//! the semantic pass rejects calendar fields that would never match at
//! runtime (bad HH:MM, bad day-of-year, non-positive repeat interval).
//! A validation failure is surfaced to the caller and leaves any existing
//! schedule stack unchanged.

use crate::model::{RepeatSchedule, Schedule, ScheduledAction, Trigger};
use crate::time::{self, TimeError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("malformed schedule: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    BadCalendar(#[from] TimeError),
    #[error("invalid repeat interval: {0:?}")]
    BadInterval(Value),
}

/// Parse and validate a schedule document.
pub fn parse_schedule(doc: &Value) -> Result<Schedule, ScheduleError> {
    let schedule: Schedule = serde_json::from_value(doc.clone())?;
    for trigger in &schedule.triggers {
        match trigger {
            Trigger::Date { date, scheduled_actions, .. } => {
                time::parse_day_of_year(date)?;
                validate_scheduled_actions(scheduled_actions)?;
            }
            Trigger::DayOfWeek { days, scheduled_actions, .. } => {
                for day in days {
                    time::parse_weekday(day)?;
                }
                validate_scheduled_actions(scheduled_actions)?;
            }
            Trigger::Event { .. } => {}
        }
    }
    Ok(schedule)
}

fn validate_scheduled_actions(actions: &[ScheduledAction]) -> Result<(), ScheduleError> {
    for action in actions {
        time::parse_hhmm(&action.time)?;
        if let Some(repeat) = &action.repeat_schedule {
            every_minutes(repeat)?;
            if let Some(until) = &repeat.until {
                time::parse_hhmm(until)?;
            }
        }
    }
    Ok(())
}

/// The repeat interval in (fractional) minutes.
pub fn every_minutes(repeat: &RepeatSchedule) -> Result<f64, ScheduleError> {
    let minutes = match &repeat.every {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match minutes {
        Some(m) if m.is_finite() && m > 0.0 => Ok(m),
        _ => Err(ScheduleError::BadInterval(repeat.every.clone())),
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
