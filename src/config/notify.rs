use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotifyConfig {
    /// URI-like destination descriptors, e.g. `https://hooks.example.com/x`
    #[serde(default)]
    pub destinations: Vec<String>,

    /// Minimum spacing between two notifications for the same client
    #[serde(default = "default_repeat_interval", with = "humantime_serde")]
    pub repeat_interval: Duration,

    /// Upper bound for a single delivery attempt
    #[serde(default = "default_send_timeout", with = "humantime_serde")]
    pub send_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            destinations: vec![],
            repeat_interval: default_repeat_interval(),
            send_timeout: default_send_timeout(),
        }
    }
}

impl NotifyConfig {
    /// Validates notification configuration
    /// # Errors
    /// Returns `Error::InvalidConfig` when:
    /// - `repeat_interval` or `send_timeout` is zero
    /// - A destination is not of the form `scheme://...`
    pub fn validate(&self) -> Result<()> {
        if self.repeat_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "notify.repeat_interval must be greater than zero".into(),
            ));
        }

        if self.send_timeout.is_zero() {
            return Err(Error::InvalidConfig("notify.send_timeout must be greater than zero".into()));
        }

        for (index, destination) in self.destinations.iter().enumerate() {
            if destination_scheme(destination).is_none() {
                // Index only: the destination itself usually carries a secret.
                return Err(Error::InvalidConfig(format!(
                    "notify.destinations[{}] is not of the form scheme://...",
                    index
                )));
            }
        }

        if self.destinations.is_empty() {
            warn!("notify.destinations is empty, down clients will only be logged");
        }

        Ok(())
    }
}

/// Returns the lowercase scheme of a `scheme://rest` descriptor.
pub(crate) fn destination_scheme(destination: &str) -> Option<String> {
    let (scheme, rest) = destination.split_once("://")?;
    if scheme.is_empty()
        || rest.is_empty()
        || !scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
    {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

fn default_repeat_interval() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_send_timeout() -> Duration {
    Duration::from_secs(10)
}
