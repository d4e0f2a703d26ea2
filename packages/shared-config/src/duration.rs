//! Human-friendly duration parsing for configuration values
//!
//! Accepted forms:
//! - a bare number of seconds: `90`
//! - a number with a unit suffix: `45s`, `15m`, `6h`, `1d`
//! - a clock-style span: `HH:MM:SS` (hours may exceed 24)

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse a duration from a configuration string
pub fn parse_duration(input: &str) -> ConfigResult<Duration> {
    let value = input.trim();
    if value.is_empty() {
        return Err(ConfigError::invalid_duration(input, "empty value"));
    }

    if value.contains(':') {
        return parse_clock(input, value);
    }

    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };

    let amount: u64 = digits
        .parse()
        .map_err(|_| ConfigError::invalid_duration(input, "expected a whole number"))?;

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => MINUTE,
        "h" | "hr" | "hrs" => HOUR,
        "d" | "day" | "days" => DAY,
        other => {
            return Err(ConfigError::invalid_duration(
                input,
                format!("unknown unit '{}'", other),
            ))
        }
    };

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::invalid_duration(input, "value is too large"))
}

fn parse_clock(input: &str, value: &str) -> ConfigResult<Duration> {
    let parts: Vec<&str> = value.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(ConfigError::invalid_duration(input, "expected HH:MM:SS"));
    };

    let parse = |part: &str| -> ConfigResult<u64> {
        part.parse()
            .map_err(|_| ConfigError::invalid_duration(input, "expected HH:MM:SS"))
    };
    let (hours, minutes, seconds) = (parse(hours)?, parse(minutes)?, parse(seconds)?);

    if minutes >= 60 || seconds >= 60 {
        return Err(ConfigError::invalid_duration(
            input,
            "minutes and seconds must be below 60",
        ));
    }

    hours
        .checked_mul(HOUR)
        .and_then(|h| h.checked_add(minutes * MINUTE + seconds))
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::invalid_duration(input, "value is too large"))
}

/// Render a duration using the largest unit that represents it exactly
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0 => "0s".to_string(),
        s if s % DAY == 0 => format!("{}d", s / DAY),
        s if s % HOUR == 0 => format!("{}h", s / HOUR),
        s if s % MINUTE == 0 => format!("{}m", s / MINUTE),
        s => format!("{}s", s),
    }
}
