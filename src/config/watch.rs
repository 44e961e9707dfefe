use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Length of a hex encoded SHA-512 digest.
const SHA512_HEX_LEN: usize = 128;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Maximum silence before a client is considered down
    #[serde(default = "default_down_interval", with = "humantime_serde")]
    pub down_interval: Duration,

    /// Stay quiet about a client until it has sent its first heartbeat
    #[serde(default)]
    pub wait_for_first_connection: bool,

    /// Sleep between two down checks of the same client
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Where state is written on graceful shutdown and read back on startup
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: PathBuf,

    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Hex SHA-512 digest of the secret the client presents, if any
    #[serde(default)]
    pub key: Option<String>,

    /// Human readable name used in notifications and the dashboard
    pub name: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            down_interval: default_down_interval(),
            wait_for_first_connection: false,
            poll_interval: default_poll_interval(),
            snapshot_file: default_snapshot_file(),
            clients: BTreeMap::new(),
        }
    }
}

impl WatchConfig {
    /// Validates watch configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when:
    /// - Either interval is zero
    /// - No client is configured
    /// - A client has an empty name or a key that is not a SHA-512 hex digest
    pub fn validate(&self) -> Result<()> {
        if self.down_interval.is_zero() {
            return Err(Error::InvalidConfig("watch.down_interval must be greater than zero".into()));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("watch.poll_interval must be greater than zero".into()));
        }

        if self.snapshot_file.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("watch.snapshot_file cannot be empty".into()));
        }

        if self.clients.is_empty() {
            return Err(Error::InvalidConfig(
                "watch.clients must contain at least one client".into(),
            ));
        }

        for (id, client) in &self.clients {
            if id.trim().is_empty() {
                return Err(Error::InvalidConfig("client id cannot be empty".into()));
            }
            if client.name.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("client {} has an empty name", id)));
            }
            if let Some(key) = &client.key {
                if key.len() != SHA512_HEX_LEN || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(Error::InvalidConfig(format!(
                        "client {} key must be a {} character hex SHA-512 digest",
                        id, SHA512_HEX_LEN
                    )));
                }
            }
        }

        Ok(())
    }

    /// Display name of a configured client, falling back to its id.
    pub fn display_name<'a>(
        &'a self,
        client_id: &'a str,
    ) -> &'a str {
        self.clients
            .get(client_id)
            .map(|c| c.name.as_str())
            .unwrap_or(client_id)
    }
}

fn default_down_interval() -> Duration {
    Duration::from_secs(5 * 60)
}
fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_snapshot_file() -> PathBuf {
    PathBuf::from("/var/lib/deadman/snapshot.json")
}
