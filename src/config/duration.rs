// src/config/duration.rs

use std::time::Duration;

use crate::errors::{LaunchgateError, Result};

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(LaunchgateError::InvalidDuration("empty duration string".to_string()));
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| {
            LaunchgateError::InvalidDuration(format!("'{s}' is missing a unit suffix"))
        })?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part.parse().map_err(|e| {
        LaunchgateError::InvalidDuration(format!("invalid number '{num_part}' in '{s}': {e}"))
    })?;
    let unit = unit_part.trim().to_lowercase();

    let secs = |mult: u64| {
        value.checked_mul(mult).map(Duration::from_secs).ok_or_else(|| {
            LaunchgateError::InvalidDuration(format!("'{s}' is too large"))
        })
    };

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(60 * 60),
        _ => Err(LaunchgateError::InvalidDuration(format!(
            "unsupported unit '{unit}' in '{s}'; expected ms, s, m, or h"
        ))),
    }
}
