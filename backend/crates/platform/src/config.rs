//! Environment-backed configuration helpers
//!
//! Every service reads its settings through these functions so that
//! missing or malformed values fail at startup with the variable name.

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid duration for {name}: {value:?} (expected e.g. 15m, 24h, 7d)")]
    InvalidTtl { name: String, value: String },

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Longest accepted lifetime; larger values overflow timestamp arithmetic
pub const MAX_TTL: Duration = Duration::from_secs(3650 * 24 * 60 * 60);

/// Parse a lifetime such as `15m`, `24h` or `7d`
///
/// Units: `m` minutes, `h` hours, `d` days. Zero, unknown units and values
/// above [`MAX_TTL`] are rejected.
pub fn parse_ttl(value: &str) -> Option<Duration> {
    let value = value.trim();
    let unit = value.chars().last()?;
    let amount: u64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    if amount == 0 {
        return None;
    }
    let seconds = match unit {
        'm' => amount.checked_mul(60)?,
        'h' => amount.checked_mul(60 * 60)?,
        'd' => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    let ttl = Duration::from_secs(seconds);
    (ttl <= MAX_TTL).then_some(ttl)
}

pub fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

/// `true`/`1`/`yes`/`on` (any case) are truthy
pub fn env_flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = env_opt(name) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("expected a boolean, got {value:?}"),
        }),
    }
}

/// Comma-separated list, blanks dropped
pub fn env_list(name: &str, default: &str) -> Vec<String> {
    env_or(name, default)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn env_ttl(name: &str, default: &str) -> Result<Duration, ConfigError> {
    let value = env_or(name, default);
    parse_ttl(&value).ok_or(ConfigError::InvalidTtl {
        name: name.to_string(),
        value,
    })
}

pub fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env_opt(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            reason: format!("expected an integer, got {value:?}"),
        }),
    }
}
