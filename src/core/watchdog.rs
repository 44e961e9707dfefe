use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::ClientStatus;
use super::StateStore;
use crate::metrics::CLIENT_DOWN;
use crate::AlerterConfig;
use crate::NotificationDispatcher;
use crate::Result;

/// Result of a single down check.
#[derive(Debug)]
pub struct CheckOutcome {
    pub status: ClientStatus,
    /// Delivery task, when this check sent a notification
    pub dispatched: Option<JoinHandle<()>>,
}

/// Polls one client forever.
///
/// Each iteration locks the client, evaluates `is_down`, runs the throttled
/// notify if needed, unlocks and sleeps `poll_interval`. A failing iteration
/// is logged and the next one runs as usual.
pub struct WatchdogLoop {
    client_id: String,
    display_name: String,
    store: Arc<StateStore>,
    dispatcher: Arc<NotificationDispatcher>,
    down_interval: Duration,
    repeat_interval: Duration,
    poll_interval: Duration,
}

impl WatchdogLoop {
    pub fn new(
        client_id: impl Into<String>,
        display_name: impl Into<String>,
        store: Arc<StateStore>,
        dispatcher: Arc<NotificationDispatcher>,
        down_interval: Duration,
        repeat_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            display_name: display_name.into(),
            store,
            dispatcher,
            down_interval,
            repeat_interval,
            poll_interval,
        }
    }

    pub fn from_config(
        client_id: &str,
        config: &AlerterConfig,
        store: Arc<StateStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self::new(
            client_id,
            config.watch.display_name(client_id),
            store,
            dispatcher,
            config.watch.down_interval,
            config.notify.repeat_interval,
            config.watch.poll_interval,
        )
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// One iteration: the client's lock is held for the whole check and
    /// released before returning.
    pub fn check(&self) -> Result<CheckOutcome> {
        let mut guard = self.store.acquire(&self.client_id)?;
        let status = guard.status(self.down_interval);
        CLIENT_DOWN
            .with_label_values(&[&self.client_id])
            .set(i64::from(status == ClientStatus::Down));

        let dispatched = if status == ClientStatus::Down {
            guard.notify(self.repeat_interval, &self.display_name, &self.dispatcher)
        } else {
            None
        };
        Ok(CheckOutcome { status, dispatched })
    }

    pub async fn run(self) {
        info!(
            "watching client {} (down after {:?}, repeat every {:?})",
            self.client_id, self.down_interval, self.repeat_interval
        );

        let mut last_status = None;
        loop {
            match self.check() {
                Ok(outcome) => {
                    if last_status != Some(outcome.status) {
                        log_transition(&self.client_id, last_status, outcome.status);
                        last_status = Some(outcome.status);
                    }
                }
                Err(e) => {
                    error!("down check for client {} failed: {:?}", self.client_id, e);
                }
            }
            sleep(self.poll_interval).await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Spawns one [`WatchdogLoop`] per configured client.
pub fn spawn_watchdogs(
    config: &AlerterConfig,
    store: &Arc<StateStore>,
    dispatcher: &Arc<NotificationDispatcher>,
) -> Vec<JoinHandle<()>> {
    store
        .list_client_ids()
        .map(|id| WatchdogLoop::from_config(id, config, store.clone(), dispatcher.clone()).spawn())
        .collect()
}

fn log_transition(
    client_id: &str,
    from: Option<ClientStatus>,
    to: ClientStatus,
) {
    match (from, to) {
        (_, ClientStatus::Down) => warn!("client {} is down", client_id),
        (Some(ClientStatus::Down), ClientStatus::Up) => info!("client {} recovered", client_id),
        (_, ClientStatus::Up) => info!("client {} is up", client_id),
        (_, ClientStatus::Unknown) => info!("client {} has not connected yet", client_id),
    }
}
