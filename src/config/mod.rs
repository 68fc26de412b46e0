//! Configuration for the collector server and the reporting agent.
//!
//! Each binary builds its config once at startup: command-line flags with
//! defaults first, then environment variables, which take precedence.
//! Environment lookups go through a function so tests never touch the
//! process environment.

mod agent_config;
mod server_config;

pub use agent_config::{AgentConfig, SendMode};
pub use server_config::{CheckpointPolicy, ServerConfig};

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Look up `key` and parse it with `FromStr`, leaving `target` untouched when
/// the variable is unset
pub(crate) fn override_from<T, F>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw))?;
    }
    Ok(())
}

pub(crate) fn override_duration<F>(lookup: &F, key: &str, target: &mut Duration) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = parse_duration(&raw).with_context(|| format!("Invalid value for {}", key))?;
    }
    Ok(())
}

/// Accepts humantime strings (`300s`, `1m 30s`) and bare seconds (`300`)
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).with_context(|| format!("Invalid duration: '{}'", raw))
}

/// Empty strings mean "not configured"
pub(crate) fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_formats() {
        assert_eq!(parse_duration("300s").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert!(parse_duration("soon").is_err());
    }
}
