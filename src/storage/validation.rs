//! Field-level validation for persisted records and user input.
//!
//! Every field is validated on its own: a bad value is replaced by that
//! field's default and never poisons the rest of the record.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::models::countdown::{MAX_TARGET_HOURS, MIN_TARGET_HOURS, SECONDS_PER_HOUR};
use crate::models::reminder::{
    DEFAULT_INTERVAL_MINUTES, INTERVAL_STEP_MINUTES, MAX_HOUR, MAX_INTERVAL_MINUTES,
    MIN_INTERVAL_MINUTES,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a value between 15 and 1440 minutes")]
    IntervalOutOfRange,

    #[error("Please enter a value between 0 and 23")]
    HourOutOfRange,
}

/// Loose numeric reading of a persisted value. `None` stands for "missing or
/// not a number".
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_number(s)?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    number.is_finite().then_some(number)
}

fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok()
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Not a number, below 15 or above 1440 yields 120; anything else is rounded
/// to the nearest multiple of 15.
pub fn validate_interval(value: Option<f64>) -> u32 {
    match value {
        Some(minutes)
            if (f64::from(MIN_INTERVAL_MINUTES)..=f64::from(MAX_INTERVAL_MINUTES))
                .contains(&minutes) =>
        {
            let step = f64::from(INTERVAL_STEP_MINUTES);
            ((minutes / step).round() * step) as u32
        }
        _ => DEFAULT_INTERVAL_MINUTES,
    }
}

pub fn validate_hour(value: Option<f64>, default: u32) -> u32 {
    match value {
        Some(hour) if (0.0..=f64::from(MAX_HOUR)).contains(&hour) => hour.round() as u32,
        _ => default,
    }
}

/// Target duration in seconds, whole hours between 1 and 10.
pub fn validate_target_duration(value: Option<f64>) -> u64 {
    let min = (u64::from(MIN_TARGET_HOURS) * SECONDS_PER_HOUR) as f64;
    let max = (u64::from(MAX_TARGET_HOURS) * SECONDS_PER_HOUR) as f64;
    match value {
        Some(seconds) if (min..=max).contains(&seconds) => {
            let hours = (seconds / SECONDS_PER_HOUR as f64).round() as u64;
            hours * SECONDS_PER_HOUR
        }
        _ => u64::from(MIN_TARGET_HOURS) * SECONDS_PER_HOUR,
    }
}

pub fn validate_remaining(value: Option<f64>) -> u64 {
    match value {
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => seconds.round() as u64,
        _ => 0,
    }
}

/// RFC 3339 strings or epoch milliseconds.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Free-text interval edit. An empty field restores the default.
pub fn parse_interval_input(raw: &str) -> Result<u32, InputError> {
    if raw.trim().is_empty() {
        return Ok(DEFAULT_INTERVAL_MINUTES);
    }

    match parse_number(raw) {
        Some(minutes)
            if (f64::from(MIN_INTERVAL_MINUTES)..=f64::from(MAX_INTERVAL_MINUTES))
                .contains(&minutes) =>
        {
            Ok(validate_interval(Some(minutes)))
        }
        _ => Err(InputError::IntervalOutOfRange),
    }
}

pub fn parse_hour_input(raw: &str, default: u32) -> Result<u32, InputError> {
    if raw.trim().is_empty() {
        return Ok(default);
    }

    match parse_number(raw) {
        Some(hour) if (0.0..=f64::from(MAX_HOUR)).contains(&hour) => {
            Ok(validate_hour(Some(hour), default))
        }
        _ => Err(InputError::HourOutOfRange),
    }
}
