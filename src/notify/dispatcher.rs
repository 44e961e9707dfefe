use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use super::NotificationSender;
use super::TEST_NOTIFICATION_BODY;
use super::TEST_NOTIFICATION_TITLE;
use crate::metrics::NOTIFICATION_FAILURES;

pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    destinations: Vec<String>,
}

impl NotificationDispatcher {
    pub fn new(
        sender: Arc<dyn NotificationSender>,
        destinations: Vec<String>,
    ) -> Self {
        Self {
            sender,
            destinations,
        }
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// Starts delivery on a detached task and returns immediately.
    ///
    /// Destinations are copied into the task, so the send is unaffected by
    /// anything that happens to this dispatcher afterwards.
    pub fn dispatch(
        &self,
        title: String,
        body: String,
    ) -> JoinHandle<()> {
        let sender = self.sender.clone();
        let destinations = self.destinations.clone();
        tokio::spawn(async move {
            deliver(sender.as_ref(), &title, &body, &destinations).await;
        })
    }

    pub fn send_test_notification(&self) -> JoinHandle<()> {
        self.dispatch(
            TEST_NOTIFICATION_TITLE.to_string(),
            TEST_NOTIFICATION_BODY.to_string(),
        )
    }
}

async fn deliver(
    sender: &dyn NotificationSender,
    title: &str,
    body: &str,
    destinations: &[String],
) {
    if destinations.is_empty() {
        warn!("no notification destinations configured, dropping: {}", title);
        return;
    }

    match sender.send(title, body, destinations).await {
        Ok(()) => debug!("notification delivered to {} destinations", destinations.len()),
        Err(e) => {
            NOTIFICATION_FAILURES.inc();
            warn!("notification dropped: {:?}", e);
        }
    }
}
