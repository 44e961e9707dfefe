//! Per-client state and the scoped handle used to read and mutate it.
//!
//! Conceptual lifecycle of one client:
//!
//! ```text
//! UNKNOWN --heartbeat--> UP --silence > down_interval--> DOWN --heartbeat--> UP
//!                                                          |
//!                                          QUIET <-> RECENTLY_NOTIFIED
//! ```
//!
//! The throttle sub-state of DOWN is `last_notification` compared against
//! `repeat_interval`.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use parking_lot::MutexGuard;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;

use super::Clock;
use super::GlobalAnchor;
use crate::metrics::NOTIFICATIONS_TRIGGERED;
use crate::NotificationDispatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    id: String,
    pub(crate) last_heartbeat: Option<Duration>,
    pub(crate) last_notification: Option<Duration>,
}

impl ClientState {
    pub(crate) fn new(
        id: String,
        last_heartbeat: Option<Duration>,
    ) -> Self {
        Self {
            id,
            last_heartbeat,
            last_notification: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `None`: never heard from, and configured to wait before alarming.
    pub fn last_heartbeat(&self) -> Option<Duration> {
        self.last_heartbeat
    }

    /// `None`: never notified.
    pub fn last_notification(&self) -> Option<Duration> {
        self.last_notification
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// No heartbeat yet, waiting for the first one
    Unknown,
    Up,
    Down,
}

impl fmt::Display for ClientStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ClientStatus::Unknown => write!(f, "unknown"),
            ClientStatus::Up => write!(f, "up"),
            ClientStatus::Down => write!(f, "down"),
        }
    }
}

/// Exclusive access to one client's state.
///
/// Holding a guard holds that client's lock; dropping it releases the lock on
/// every exit path. Never hold a guard across an `.await`.
pub struct ClientGuard<'a> {
    state: MutexGuard<'a, ClientState>,
    clock: &'a dyn Clock,
    anchor: &'a GlobalAnchor,
}

impl<'a> ClientGuard<'a> {
    pub(crate) fn new(
        state: MutexGuard<'a, ClientState>,
        clock: &'a dyn Clock,
        anchor: &'a GlobalAnchor,
    ) -> Self {
        Self {
            state,
            clock,
            anchor,
        }
    }

    pub fn reset_heartbeat(&mut self) {
        self.state.last_heartbeat = Some(self.clock.monotonic());
    }

    /// Silence is measured from the later of the last heartbeat and process
    /// start, so a stale recovered heartbeat cannot trip the alarm before
    /// this process has watched for a full `down_interval`.
    pub fn is_down(
        &self,
        down_interval: Duration,
    ) -> bool {
        let Some(last_heartbeat) = self.state.last_heartbeat else {
            return false;
        };
        let since = last_heartbeat.max(self.anchor.start_mono());
        self.clock.monotonic().saturating_sub(since) > down_interval
    }

    pub fn status(
        &self,
        down_interval: Duration,
    ) -> ClientStatus {
        if self.state.last_heartbeat.is_none() {
            ClientStatus::Unknown
        } else if self.is_down(down_interval) {
            ClientStatus::Down
        } else {
            ClientStatus::Up
        }
    }

    /// Wall time of the last real heartbeat. `None` when there was none, or
    /// when the value is still the one seeded at startup.
    pub fn last_alert_wall_time(&self) -> Option<DateTime<Utc>> {
        match self.state.last_heartbeat {
            None => None,
            Some(t) if t == self.anchor.start_mono() => None,
            Some(t) => self.anchor.wall_equivalent(t),
        }
    }

    pub fn recently_notified(
        &self,
        repeat_interval: Duration,
    ) -> bool {
        match self.state.last_notification {
            None => false,
            Some(t) => self.clock.monotonic().saturating_sub(t) <= repeat_interval,
        }
    }

    /// Sends a "client is down" notification unless one went out within
    /// `repeat_interval`.
    ///
    /// The throttle window is opened before the send is handed off, while
    /// the lock is still held. Delivery runs on a detached task; the returned
    /// handle may be dropped.
    pub fn notify(
        &mut self,
        repeat_interval: Duration,
        display_name: &str,
        dispatcher: &NotificationDispatcher,
    ) -> Option<JoinHandle<()>> {
        if self.recently_notified(repeat_interval) {
            debug!("client {} notified recently, skipping", self.state.id);
            return None;
        }

        self.state.last_notification = Some(self.clock.monotonic());

        let since = self
            .last_alert_wall_time()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "never".to_string());
        let (title, body) = down_message(&self.state.id, display_name, &since);

        info!("client {} is down (last heartbeat: {}), notifying", self.state.id, since);
        NOTIFICATIONS_TRIGGERED.with_label_values(&[&self.state.id]).inc();
        Some(dispatcher.dispatch(title, body))
    }
}

impl Deref for ClientGuard<'_> {
    type Target = ClientState;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

pub(crate) fn down_message(
    client_id: &str,
    display_name: &str,
    since: &str,
) -> (String, String) {
    let title = format!("**{} is down!**", display_name);
    let body = format!(
        "Your watched instance \"{}\" ({}) seems to be down!\nNo heartbeat has been received since {}.\n",
        display_name, client_id, since
    );
    (title, body)
}
