use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::destination_scheme;
use crate::Error;
use crate::Result;

/// Capability to push a message to a list of destinations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync + 'static {
    /// Single attempt per destination. Returns an error if any destination
    /// failed; the others are still attempted.
    async fn send(
        &self,
        title: &str,
        body: &str,
        destinations: &[String],
    ) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
}

/// Default sender, routing on the destination scheme:
/// - `http`, `https`: JSON `{"title", "body"}` POSTed to the URL
/// - `log`: emitted as a tracing event
///
/// Other schemes are reported as failures.
pub struct ChannelSender {
    client: reqwest::Client,
}

impl ChannelSender {
    pub fn new(send_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(|e| Error::Fatal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn send_one(
        &self,
        title: &str,
        body: &str,
        destination: &str,
    ) -> Result<()> {
        match destination_scheme(destination).as_deref() {
            Some("http") | Some("https") => {
                self.client
                    .post(destination)
                    .json(&WebhookPayload { title, body })
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    // The URL may carry a token.
                    .map_err(|e| Error::notification(e.without_url().to_string()))?;
                Ok(())
            }
            Some("log") => {
                info!(target: "deadman::notification", "{}\n{}", title, body);
                Ok(())
            }
            Some(other) => Err(Error::notification(format!(
                "unsupported destination scheme {}",
                other
            ))),
            None => Err(Error::notification("malformed destination")),
        }
    }
}

#[async_trait]
impl NotificationSender for ChannelSender {
    async fn send(
        &self,
        title: &str,
        body: &str,
        destinations: &[String],
    ) -> Result<()> {
        let mut failures = Vec::new();
        for (index, destination) in destinations.iter().enumerate() {
            if let Err(e) = self.send_one(title, body, destination).await {
                warn!("destinations[{}] failed: {}", index, e);
                failures.push(format!("destinations[{}]: {}", index, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::notification(failures.join("; ")))
        }
    }
}
