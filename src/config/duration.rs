// src/config/duration.rs

use std::time::Duration;

use crate::errors::ConfigError;

/// Parse a duration string like `"250ms"`, `"30s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ConfigError::Invalid("empty duration string".to_string()));
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| ConfigError::Invalid(format!("duration '{s}' is missing a unit suffix")))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("invalid duration number '{num_part}': {e}")))?;
    let unit = unit_part.trim().to_lowercase();

    let secs = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::Invalid(format!("duration '{s}' is too large")))
    };

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(60 * 60),
        _ => Err(ConfigError::Invalid(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        ))),
    }
}
