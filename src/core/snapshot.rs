//! On-disk snapshot of per-client state.
//!
//! Written once on graceful shutdown and consumed (read then deleted) on the
//! next startup. The format is a JSON object:
//!
//! ```json
//! {"clientid1": {"last_heartbeat": 1000.5, "last_notification": null}}
//! ```
//!
//! Numbers are seconds on the host monotonic clock of the writing process.
//! They are only meaningful to a successor started on the same boot.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::file_io;
use crate::SnapshotError;

pub type Snapshot = BTreeMap<String, SnapshotRecord>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    #[serde(default)]
    pub last_heartbeat: Option<f64>,
    #[serde(default)]
    pub last_notification: Option<f64>,
}

impl SnapshotRecord {
    pub(crate) fn new(
        last_heartbeat: Option<Duration>,
        last_notification: Option<Duration>,
    ) -> Self {
        Self {
            last_heartbeat: last_heartbeat.map(|d| d.as_secs_f64()),
            last_notification: last_notification.map(|d| d.as_secs_f64()),
        }
    }
}

/// Readings below this many seconds decode to the exact nanosecond.
const NANOS_EXACT_BELOW: f64 = (1u64 << 21) as f64;

/// Converts a persisted reading back to a monotonic timestamp. `None` for
/// negative or non-finite values.
///
/// Readings are rounded to the nearest nanosecond, or to the nearest
/// microsecond past [`NANOS_EXACT_BELOW`] where an `f64` can no longer hold
/// nanoseconds. [`SystemClock`](super::SystemClock) only produces whole
/// microseconds, so its readings always come back unchanged.
pub(crate) fn to_mono(
    secs: f64,
    client_id: &str,
    field: &str,
) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        warn!("snapshot {} for client {} is invalid: {}", field, client_id, secs);
        return None;
    }
    if secs < NANOS_EXACT_BELOW {
        return Some(Duration::from_nanos((secs * 1e9).round() as u64));
    }
    let micros = (secs * 1e6).round();
    if micros >= u64::MAX as f64 {
        warn!("snapshot {} for client {} is out of range: {}", field, client_id, secs);
        return None;
    }
    Some(Duration::from_micros(micros as u64))
}

/// Reads and removes the snapshot at `path`.
///
/// `Ok(None)` when no snapshot exists. A corrupt file is still removed so the
/// next restart does not trip over it again.
pub(crate) fn take(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    let buf = file_io::take_file(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match buf {
        None => Ok(None),
        Some(buf) => serde_json::from_slice(&buf)
            .map(Some)
            .map_err(|source| SnapshotError::Corrupt {
                path: path.to_path_buf(),
                source,
            }),
    }
}

pub(crate) fn write(
    path: &Path,
    snapshot: &Snapshot,
) -> Result<(), SnapshotError> {
    let buf = serde_json::to_vec(snapshot)?;
    file_io::write_atomically(path, &buf).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}
