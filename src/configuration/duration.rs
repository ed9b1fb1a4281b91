//! Human-readable duration strings as they appear in the configuration file,
//! e.g. `"5m"`, `"30s"`, `"1h30m"` or `"250ms"`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error_handling::types::ConfigError;

fn whole_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:\d+(?:ms|s|m|h|d))+$").expect("valid duration regex"))
}

fn component_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)(ms|s|m|h|d)").expect("valid duration regex"))
}

/// Parses a duration string made of one or more `<integer><unit>` components.
///
/// Supported units: `ms`, `s`, `m`, `h`, `d`. Whitespace around the value is
/// ignored; anything else is rejected with [`ConfigError::InvalidDuration`].
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    if !whole_pattern().is_match(trimmed) {
        return Err(ConfigError::InvalidDuration(format!(
            "'{}' is not of the form <int>(ms|s|m|h|d)",
            input
        )));
    }

    let mut total = Duration::ZERO;
    for caps in component_pattern().captures_iter(trimmed) {
        let value: u64 = caps[1]
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(format!("'{}' overflows", input)))?;
        let part = match &caps[2] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => Duration::from_secs(value.saturating_mul(86_400)),
        };
        total = total.saturating_add(part);
    }
    Ok(total)
}

/// Serde adapter so configuration structs can hold a [`Duration`] directly.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
