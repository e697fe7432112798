//! Target and value checks shared by the config loader and the CLI.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Highest echo count; each echo needs its own 16-bit ICMP sequence number.
pub const MAX_PING_COUNT: u32 = u16::MAX as u32;

/// Errors raised while loading or checking a [`ProberConfig`](super::ProberConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// The config file is not valid YAML for this schema.
    #[error("invalid YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A value is out of range or malformed.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

impl ConfigError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<fallback>[^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Substitute `${NAME}` and `${NAME:-fallback}` references from the
/// environment. Unset variables without a fallback become empty.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps["name"]).unwrap_or_else(|_| {
                caps.name("fallback")
                    .map_or_else(String::new, |m| m.as_str().to_owned())
            })
        })
        .into_owned()
}

/// Parse a human-readable duration such as `250ms`, `5s` or `1m30s`.
///
/// Used as the clap value parser for `--interval`.
///
/// ```
/// use pathprobe::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| format!("invalid duration '{s}': {e}"))
}

/// Split a target into host and optional port.
///
/// `[v6]:port` and `[v6]` use brackets; an unbracketed address with more
/// than one colon is a bare IPv6 host.
fn split_target(target: &str) -> Result<(&str, Option<&str>), ConfigError> {
    if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            ConfigError::invalid(format!("target '{target}' has an unclosed '['"))
        })?;
        return match tail {
            "" => Ok((host, None)),
            _ => match tail.strip_prefix(':') {
                Some(port) => Ok((host, Some(port))),
                None => Err(ConfigError::invalid(format!(
                    "target '{target}' has junk after ']'"
                ))),
            },
        };
    }

    match target.matches(':').count() {
        0 => Ok((target, None)),
        1 => Ok(target
            .split_once(':')
            .map_or((target, None), |(host, port)| (host, Some(port)))),
        _ => Ok((target, None)),
    }
}

/// Check that `target` is `host`, `host:port`, `[v6]` or `[v6]:port`.
pub(crate) fn validate_target(target: &str) -> Result<(), ConfigError> {
    if target.is_empty() {
        return Err(ConfigError::invalid("target address is required"));
    }
    if target.contains("://") || target.contains('/') {
        return Err(ConfigError::invalid(format!(
            "target must be host[:port], not a URL: '{target}'"
        )));
    }
    if target.chars().any(char::is_whitespace) {
        return Err(ConfigError::invalid(format!(
            "target must not contain whitespace: '{target}'"
        )));
    }

    let (host, port) = split_target(target)?;
    if host.is_empty() {
        return Err(ConfigError::invalid(format!("target '{target}' has no host")));
    }
    if let Some(port) = port {
        match port.parse::<u16>() {
            Ok(p) if p != 0 => {}
            _ => {
                return Err(ConfigError::invalid(format!(
                    "target '{target}' has invalid port '{port}' (expected 1-65535)"
                )));
            }
        }
    }
    Ok(())
}

/// Echo count must fit the ICMP sequence space.
pub(crate) fn validate_ping_count(count: u32) -> Result<(), ConfigError> {
    if count == 0 || count > MAX_PING_COUNT {
        return Err(ConfigError::invalid(format!(
            "ping.count must be between 1 and {MAX_PING_COUNT}, got {count}"
        )));
    }
    Ok(())
}

/// Reject durations that would make a probe fail immediately.
pub(crate) fn require_non_zero(field: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::invalid(format!("{field} must be greater than zero")));
    }
    Ok(())
}
