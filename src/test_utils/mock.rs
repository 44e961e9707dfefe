use async_trait::async_trait;
use parking_lot::Mutex;

use crate::NotificationSender;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub title: String,
    pub body: String,
    pub destinations: Vec<String>,
}

/// Sender that records every call and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        title: &str,
        body: &str,
        destinations: &[String],
    ) -> Result<()> {
        self.sent.lock().push(SentNotification {
            title: title.to_string(),
            body: body.to_string(),
            destinations: destinations.to_vec(),
        });
        Ok(())
    }
}
