//! Environment variable parsing utilities.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Get environment variable with default value.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get optional environment variable (None if empty or missing).
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// Parse environment variable with type conversion.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v.trim().parse().map_err(|e: T::Err| ConfigError::Parse {
            key: key.into(),
            value: v,
            error: e.to_string(),
        }),
        _ => Ok(default),
    }
}

/// Parse duration string (e.g., "100ms", "30s", "2m", "1h", "1d", "1w").
/// Returns None for "off" or "0".
pub fn parse_duration(s: &str) -> Result<Option<Duration>, String> {
    let s = s.trim().to_lowercase();

    if s == "off" || s == "0" || s.is_empty() {
        return Ok(None);
    }

    // "ms" has to be matched before "m" and "s"
    if let Some(num_str) = s.strip_suffix("ms") {
        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("invalid number: {}", num_str))?;
        return Ok(Some(Duration::from_millis(num)).filter(|d| !d.is_zero()));
    }

    let Some(unit) = s.chars().last().filter(char::is_ascii_alphabetic) else {
        // Plain seconds
        return s
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| format!("invalid duration: {}", s));
    };
    let num_str = &s[..s.len() - 1];

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    let secs = match unit {
        's' => num,
        'm' => num * 60,
        'h' => num * 3600,
        'd' => num * 86400,
        'w' => num * 86400 * 7,
        _ => return Err(format!("invalid unit: {}", unit)),
    };

    Ok(Some(Duration::from_secs(secs)).filter(|d| !d.is_zero()))
}

/// Parse environment variable as duration.
pub fn env_duration(key: &str, default: &str) -> Result<Option<Duration>, ConfigError> {
    let value = env_or(key, default);
    parse_duration(&value).map_err(|e| ConfigError::Parse {
        key: key.into(),
        value,
        error: e,
    })
}
