//! Configuration management module for the watchdog.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`--config` or `CONFIG_PATH`)
//! - Environment variable overrides (`DEADMAN__` prefix)
//! - Component-wise validation
mod notify;
mod server;
mod watch;
pub use notify::*;
pub use server::*;
pub use watch::*;

#[cfg(test)]
mod config_test;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

const ENV_PREFIX: &str = "DEADMAN";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration container for the watchdog
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file given explicitly or by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone)]
pub struct AlerterConfig {
    /// Default log filter when neither `RUST_LOG` nor `--log-level` is set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Monitored clients and timeout detection
    #[serde(default)]
    pub watch: WatchConfig,
    /// Notification destinations and throttling
    #[serde(default)]
    pub notify: NotifyConfig,
    /// HTTP ingest, dashboard and metrics endpoint
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            watch: WatchConfig::default(),
            notify: NotifyConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Debug for AlerterConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        // Destinations embed credentials, keep them out of logs.
        f.debug_struct("AlerterConfig")
            .field("log_level", &self.log_level)
            .field("clients", &self.watch.clients.keys().collect::<Vec<_>>())
            .field("down_interval", &self.watch.down_interval)
            .field("repeat_interval", &self.notify.repeat_interval)
            .field("listen_address", &self.server.listen_address)
            .finish()
    }
}

impl AlerterConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. `config_path`, or the file named by the `CONFIG_PATH` environment variable
    /// 3. Environment variables with `DEADMAN__` prefix (highest priority)
    ///
    /// # Note
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// let cfg = AlerterConfig::load(Some("/etc/deadman.toml"))?.validate()?;
    /// ```
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let path = config_path
            .map(str::to_string)
            .or_else(|| env::var("CONFIG_PATH").ok());
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(&path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("notify.destinations"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config) // No validation - deferred to validate()
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns validation errors from any subsystem:
    /// - Zero intervals
    /// - Missing clients or malformed client keys
    /// - Malformed notification destinations
    /// - Unknown log level
    pub fn validate(self) -> Result<Self> {
        if !is_valid_log_level(&self.log_level) {
            return Err(Error::InvalidConfig(format!(
                "log_level must be one of {:?}, got {:?}",
                LOG_LEVELS, self.log_level
            )));
        }
        self.watch.validate()?;
        self.notify.validate()?;
        self.server.validate()?;
        Ok(self)
    }
}

pub(crate) fn is_valid_log_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
}

fn default_log_level() -> String {
    "info".to_string()
}
