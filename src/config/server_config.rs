//! Collector server configuration.
//!
//! | Flag | Env            | Default                       |
//! |------|----------------|-------------------------------|
//! | `-a` | ADDRESS        | `localhost:8080`              |
//! | `-i` | STORE_INTERVAL | `300s` (`0` = synchronous)    |
//! | `-f` | STORE_FILE     | `/tmp/devops-metrics-db.json` |
//! | `-r` | RESTORE        | `true`                        |
//! | `-k` | KEY            | empty (no integrity checks)   |
//! | `-d` | DATABASE_DSN   | empty (in-memory backend)     |

use super::{non_empty, override_duration, override_from, parse_duration};
use anyhow::Result;
use clap::{ArgAction, Parser};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// When the in-memory repository is written to its snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    Disabled,
    /// Write on a fixed timer
    Periodic(Duration),
    /// Write after every successful mutating request
    Synchronous,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Metrics collector server", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on (host:port)
    #[arg(short = 'a', long = "address", default_value = "localhost:8080")]
    pub address: String,

    /// Snapshot interval; 0 writes the snapshot after every update
    #[arg(short = 'i', long = "store-interval", default_value = "300s", value_parser = parse_duration)]
    pub store_interval: Duration,

    /// Snapshot file; empty disables snapshots
    #[arg(short = 'f', long = "store-file", default_value = "/tmp/devops-metrics-db.json")]
    pub store_file: String,

    /// Restore the in-memory repository from the snapshot file on startup
    #[arg(short = 'r', long = "restore", default_value_t = true, action = ArgAction::Set)]
    pub restore: bool,

    /// Shared secret for message digests
    #[arg(short = 'k', long = "key", default_value = "")]
    pub key: String,

    /// SQLite connection URL; selects the database backend when set
    #[arg(short = 'd', long = "database-dsn", default_value = "")]
    pub database_dsn: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            store_interval: Duration::from_secs(300),
            store_file: "/tmp/devops-metrics-db.json".to_string(),
            restore: true,
            key: String::new(),
            database_dsn: String::new(),
        }
    }
}

impl ServerConfig {
    /// Parse process arguments, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::parse();
        config.apply_env(&|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(lookup, "ADDRESS", &mut self.address)?;
        override_duration(lookup, "STORE_INTERVAL", &mut self.store_interval)?;
        override_from(lookup, "STORE_FILE", &mut self.store_file)?;
        override_from(lookup, "RESTORE", &mut self.restore)?;
        override_from(lookup, "KEY", &mut self.key)?;
        override_from(lookup, "DATABASE_DSN", &mut self.database_dsn)?;
        Ok(())
    }

    pub fn key(&self) -> Option<&str> {
        non_empty(&self.key)
    }

    pub fn database_dsn(&self) -> Option<&str> {
        non_empty(&self.database_dsn)
    }

    /// Snapshot file, only meaningful for the in-memory backend
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        if self.database_dsn().is_some() {
            return None;
        }
        non_empty(&self.store_file).map(PathBuf::from)
    }

    pub fn checkpoint_policy(&self) -> CheckpointPolicy {
        if self.snapshot_path().is_none() {
            CheckpointPolicy::Disabled
        } else if self.store_interval.is_zero() {
            CheckpointPolicy::Synchronous
        } else {
            CheckpointPolicy::Periodic(self.store_interval)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["server"]).unwrap();
        assert_eq!(config.address, "localhost:8080");
        assert_eq!(config.store_interval, Duration::from_secs(300));
        assert!(config.restore);
        assert_eq!(config.key(), None);
        assert_eq!(
            config.checkpoint_policy(),
            CheckpointPolicy::Periodic(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::try_parse_from([
            "server", "-a", "0.0.0.0:9000", "-i", "0", "-f", "/var/lib/m.json", "-r", "false",
            "-k", "secret",
        ])
        .unwrap();
        assert_eq!(config.address, "0.0.0.0:9000");
        assert!(!config.restore);
        assert_eq!(config.key(), Some("secret"));
        assert_eq!(config.checkpoint_policy(), CheckpointPolicy::Synchronous);
    }

    #[test]
    fn test_env_overrides_flags() {
        let mut config =
            ServerConfig::try_parse_from(["server", "-a", "cmd.site:1", "-i", "15s"]).unwrap();
        config
            .apply_env(&env_of(&[("ADDRESS", "env.site:2"), ("STORE_INTERVAL", "20s")]))
            .unwrap();

        assert_eq!(config.address, "env.site:2");
        assert_eq!(config.store_interval, Duration::from_secs(20));
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        let mut config = ServerConfig::default();
        assert!(config.apply_env(&env_of(&[("RESTORE", "maybe")])).is_err());
    }

    #[test]
    fn test_database_disables_snapshots() {
        let config = ServerConfig {
            database_dsn: "sqlite://metrics.db".to_string(),
            ..Default::default()
        };
        assert_eq!(config.snapshot_path(), None);
        assert_eq!(config.checkpoint_policy(), CheckpointPolicy::Disabled);
    }

    #[test]
    fn test_empty_store_file_disables_snapshots() {
        let config = ServerConfig {
            store_file: String::new(),
            ..Default::default()
        };
        assert_eq!(config.checkpoint_policy(), CheckpointPolicy::Disabled);
    }
}
