//! Owner of every client's state.
//!
//! The set of clients is fixed when the store is built and never changes
//! afterwards, so the map itself needs no synchronization: only each entry
//! is guarded, by its own lock. Operations on different clients never
//! contend.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::snapshot;
use super::snapshot::Snapshot;
use super::snapshot::SnapshotRecord;
use super::ClientGuard;
use super::ClientState;
use super::Clock;
use super::GlobalAnchor;
use crate::Error;
use crate::Result;

pub struct StateStore {
    anchor: GlobalAnchor,
    clock: Arc<dyn Clock>,
    // BTreeMap: iteration order is the sorted id order used for multi-lock
    // acquisition.
    clients: BTreeMap<String, Mutex<ClientState>>,
    snapshot_path: PathBuf,
}

impl StateStore {
    /// Builds the store and recovers state left by a graceful shutdown.
    ///
    /// 1. Captures the [`GlobalAnchor`].
    /// 2. Seeds every client: `last_heartbeat` is exactly `start_mono`, or
    ///    `None` with `wait_for_first_connection`.
    /// 3. Consumes the snapshot at `snapshot_path`, if any, overwriting the
    ///    seeds of clients that are still configured.
    ///
    /// A missing or corrupt snapshot never fails startup. The store is built
    /// by value, so nothing else can observe it before this returns.
    pub fn initialize<I, S>(
        clock: Arc<dyn Clock>,
        client_ids: I,
        wait_for_first_connection: bool,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let anchor = GlobalAnchor::capture(clock.as_ref());
        let seed = if wait_for_first_connection {
            None
        } else {
            Some(anchor.start_mono())
        };

        let clients = client_ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                (id.clone(), Mutex::new(ClientState::new(id, seed)))
            })
            .collect();

        let mut store = Self {
            anchor,
            clock,
            clients,
            snapshot_path: snapshot_path.into(),
        };

        match snapshot::take(&store.snapshot_path) {
            Ok(Some(snapshot)) => {
                info!("recovering state from snapshot {:?}", store.snapshot_path);
                store.merge(snapshot);
            }
            Ok(None) => {
                debug!("no snapshot at {:?}, starting fresh", store.snapshot_path);
            }
            Err(e) => {
                warn!("ignoring unusable snapshot, starting fresh: {:?}", e);
            }
        }

        store
    }

    fn merge(
        &mut self,
        snapshot: Snapshot,
    ) {
        let now = self.clock.monotonic();
        for (id, record) in snapshot {
            let Some(entry) = self.clients.get_mut(&id) else {
                debug!("dropping snapshot entry for unconfigured client {}", id);
                continue;
            };
            let state = entry.get_mut();
            state.last_heartbeat = recover(
                record.last_heartbeat,
                state.last_heartbeat,
                now,
                &id,
                "last_heartbeat",
            );
            state.last_notification = recover(
                record.last_notification,
                state.last_notification,
                now,
                &id,
                "last_notification",
            );
        }
    }

    /// Blocks until the client's lock is free.
    pub fn acquire(
        &self,
        client_id: &str,
    ) -> Result<ClientGuard<'_>> {
        let entry = self.entry(client_id)?;
        Ok(ClientGuard::new(entry.lock(), self.clock.as_ref(), &self.anchor))
    }

    /// Non-blocking [`acquire`](Self::acquire). `Ok(None)` while another
    /// holder has the lock.
    pub fn try_acquire(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientGuard<'_>>> {
        let entry = self.entry(client_id)?;
        Ok(entry
            .try_lock()
            .map(|state| ClientGuard::new(state, self.clock.as_ref(), &self.anchor)))
    }

    pub fn reset_heartbeat(
        &self,
        client_id: &str,
    ) -> Result<()> {
        self.acquire(client_id)?.reset_heartbeat();
        Ok(())
    }

    pub fn is_down(
        &self,
        client_id: &str,
        down_interval: Duration,
    ) -> Result<bool> {
        Ok(self.acquire(client_id)?.is_down(down_interval))
    }

    pub fn last_alert_wall_time(
        &self,
        client_id: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self.acquire(client_id)?.last_alert_wall_time())
    }

    /// Configured ids in sorted order. Call again to restart the enumeration.
    pub fn list_client_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.clients.keys().map(String::as_str)
    }

    pub fn contains(
        &self,
        client_id: &str,
    ) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn anchor(&self) -> &GlobalAnchor {
        &self.anchor
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Locks every client in sorted id order, writes the snapshot and keeps
    /// every lock held for good.
    ///
    /// This is the one-way drain that precedes process exit: once it
    /// returns, any further access to a client blocks forever. The guards
    /// are forgotten on purpose, whether or not the write succeeded.
    ///
    /// `parking_lot` locks block the calling thread, so each watchdog or
    /// ingest task that touches a client afterwards pins a tokio worker
    /// thread for good. That only holds up because the caller exits the
    /// process right after, from the `block_on` thread rather than a worker.
    pub fn dump_and_halt(&self) -> Result<()> {
        let guards: Vec<MutexGuard<'_, ClientState>> =
            self.clients.values().map(|entry| entry.lock()).collect();

        let snapshot: Snapshot = guards
            .iter()
            .map(|state| {
                (
                    state.id().to_string(),
                    SnapshotRecord::new(state.last_heartbeat, state.last_notification),
                )
            })
            .collect();

        let result = snapshot::write(&self.snapshot_path, &snapshot);
        match &result {
            Ok(()) => info!(
                "state of {} clients written to {:?}",
                snapshot.len(),
                self.snapshot_path
            ),
            Err(e) => error!("failed to write snapshot: {:?}", e),
        }

        std::mem::forget(guards);
        result.map_err(Error::from)
    }

    fn entry(
        &self,
        client_id: &str,
    ) -> Result<&Mutex<ClientState>> {
        self.clients
            .get(client_id)
            .ok_or_else(|| Error::UnknownClient(client_id.to_string()))
    }
}

/// Picks the value a client starts with from its snapshot record.
///
/// An unreadable number keeps the seeded value. A timestamp later than "now"
/// can only come from a previous boot and is pulled back to "now", so
/// `last_notification` never lies in the future.
fn recover(
    recorded: Option<f64>,
    seeded: Option<Duration>,
    now: Duration,
    client_id: &str,
    field: &str,
) -> Option<Duration> {
    let secs = recorded?;
    match snapshot::to_mono(secs, client_id, field) {
        None => seeded,
        Some(t) if t > now => {
            warn!(
                "snapshot timestamp for client {} is ahead of the monotonic clock, clamping",
                client_id
            );
            Some(now)
        }
        Some(t) => Some(t),
    }
}
