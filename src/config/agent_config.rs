//! Reporting agent configuration.
//!
//! | Flag | Env             | Default          |
//! |------|-----------------|------------------|
//! | `-a` | ADDRESS         | `localhost:8080` |
//! | `-p` | POLL_INTERVAL   | `2s`             |
//! | `-r` | REPORT_INTERVAL | `10s`            |
//! | `-k` | KEY             | empty            |
//! | `-l` | RATE_LIMIT      | `1`              |
//! | `-m` | SEND_MODE       | `batch`          |

use super::{non_empty, override_duration, override_from, parse_duration};
use anyhow::{Result, ensure};
use clap::Parser;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How one report is put on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// One `POST /updates/` carrying every metric
    #[default]
    Batch,
    /// One `POST /update/` JSON message per metric
    Json,
    /// One path-encoded `POST /update/{kind}/{name}/{value}` per metric
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSendMode(String);

impl fmt::Display for UnknownSendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid SEND_MODE: {}. Must be 'batch', 'json', or 'url'",
            self.0
        )
    }
}

impl std::error::Error for UnknownSendMode {}

impl FromStr for SendMode {
    type Err = UnknownSendMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "batch" => Ok(SendMode::Batch),
            "json" => Ok(SendMode::Json),
            "url" => Ok(SendMode::Url),
            _ => Err(UnknownSendMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Host metrics reporting agent", long_about = None)]
pub struct AgentConfig {
    /// Collector address (host:port or URL)
    #[arg(short = 'a', long = "address", default_value = "localhost:8080")]
    pub address: String,

    /// How often host statistics are sampled
    #[arg(short = 'p', long = "poll-interval", default_value = "2s", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// How often collected metrics are sent
    #[arg(short = 'r', long = "report-interval", default_value = "10s", value_parser = parse_duration)]
    pub report_interval: Duration,

    /// Shared secret for message digests
    #[arg(short = 'k', long = "key", default_value = "")]
    pub key: String,

    /// Maximum number of concurrent outbound sends
    #[arg(short = 'l', long = "rate-limit", default_value_t = 1)]
    pub rate_limit: usize,

    /// Wire format: batch, json or url
    #[arg(short = 'm', long = "send-mode", default_value = "batch", value_parser = SendMode::from_str)]
    pub send_mode: SendMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            key: String::new(),
            rate_limit: 1,
            send_mode: SendMode::Batch,
        }
    }
}

impl AgentConfig {
    /// Parse process arguments, apply environment overrides and validate
    pub fn load() -> Result<Self> {
        let mut config = Self::parse();
        config.apply_env(&|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(lookup, "ADDRESS", &mut self.address)?;
        override_duration(lookup, "POLL_INTERVAL", &mut self.poll_interval)?;
        override_duration(lookup, "REPORT_INTERVAL", &mut self.report_interval)?;
        override_from(lookup, "KEY", &mut self.key)?;
        override_from(lookup, "RATE_LIMIT", &mut self.rate_limit)?;
        override_from(lookup, "SEND_MODE", &mut self.send_mode)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.rate_limit > 0, "RATE_LIMIT must be at least 1");
        ensure!(!self.poll_interval.is_zero(), "POLL_INTERVAL must be positive");
        ensure!(!self.report_interval.is_zero(), "REPORT_INTERVAL must be positive");
        Ok(())
    }

    pub fn key(&self) -> Option<&str> {
        non_empty(&self.key)
    }
}
