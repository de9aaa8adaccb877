// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration string parsing.
//!
//! Durations on the wire are `<count><s|m|h|d>` or a bare number. The unit of
//! a bare number depends on the field: event TTLs read bare numbers as
//! seconds, waits read them as minutes.

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DurationError {
    #[error("invalid duration: {0:?}")]
    Invalid(String),
    #[error("duration must be positive: {0:?}")]
    NonPositive(String),
}

/// Unit applied to bare numbers without a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BareUnit {
    Seconds,
    Minutes,
}

/// Parse a duration string such as `"30s"`, `"5m"`, `"2h"`, `"1d"`, or `"90"`.
///
/// Fractional counts are accepted (`"0.5m"` is 30 seconds). Bare numbers use
/// `bare` as their unit.
pub fn parse_duration(input: &str, bare: BareUnit) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let (count_str, unit_secs) = match s.as_bytes()[s.len() - 1] {
        b's' => (&s[..s.len() - 1], 1.0),
        b'm' => (&s[..s.len() - 1], 60.0),
        b'h' => (&s[..s.len() - 1], 3600.0),
        b'd' => (&s[..s.len() - 1], 86400.0),
        _ => {
            let unit = match bare {
                BareUnit::Seconds => 1.0,
                BareUnit::Minutes => 60.0,
            };
            (s, unit)
        }
    };

    let count: f64 = count_str
        .trim()
        .parse()
        .map_err(|_| DurationError::Invalid(input.to_string()))?;
    if !count.is_finite() || count <= 0.0 {
        return Err(DurationError::NonPositive(input.to_string()));
    }

    let millis = (count * unit_secs * 1000.0).round() as i64;
    Ok(Duration::milliseconds(millis))
}

/// Parse a duration from a JSON value: either a string form or a bare number.
pub fn parse_duration_value(
    value: &serde_json::Value,
    bare: BareUnit,
) -> Result<Duration, DurationError> {
    match value {
        serde_json::Value::String(s) => parse_duration(s, bare),
        serde_json::Value::Number(n) => {
            let count = n.as_f64().unwrap_or(0.0);
            parse_duration(&count.to_string(), bare)
        }
        other => Err(DurationError::Invalid(other.to_string())),
    }
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
