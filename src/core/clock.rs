//! Time sources for the watchdog.
//!
//! All interval math runs on a monotonic clock. Wall-clock time is read once,
//! when the [`GlobalAnchor`] is captured, and is only used for display.

use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use nix::time::clock_gettime;
use nix::time::ClockId;
use parking_lot::Mutex;

use crate::Error;
use crate::Result;

pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since an unspecified origin shared by every process on
    /// this host. Never runs backward.
    fn monotonic(&self) -> Duration;

    /// Current wall-clock time.
    fn wall(&self) -> DateTime<Utc>;
}

/// Host clock backed by `CLOCK_MONOTONIC`.
///
/// The origin is the system-wide monotonic epoch rather than process start,
/// so readings persisted by one process stay comparable for its successor
/// on the same boot.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    origin_mono: Duration,
}

impl SystemClock {
    pub fn new() -> Result<Self> {
        let origin = Instant::now();
        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| Error::Fatal(format!("CLOCK_MONOTONIC unavailable: {}", e)))?;
        let origin_mono = Duration::new(ts.tv_sec() as u64, ts.tv_nsec() as u32);
        Ok(Self {
            origin,
            origin_mono,
        })
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        // Instant is CLOCK_MONOTONIC on Linux; only the offset is re-based.
        let now = self.origin_mono + self.origin.elapsed();
        // Whole microseconds survive the f64 snapshot encoding at any uptime.
        Duration::from_micros(now.as_micros() as u64)
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    base_wall: DateTime<Utc>,
    base_mono: Duration,
    mono: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(
        start_mono: Duration,
        start_wall: DateTime<Utc>,
    ) -> Self {
        Self {
            base_wall: start_wall,
            base_mono: start_mono,
            mono: Mutex::new(start_mono),
        }
    }

    pub fn advance(
        &self,
        by: Duration,
    ) {
        *self.mono.lock() += by;
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        *self.mono.lock()
    }

    fn wall(&self) -> DateTime<Utc> {
        let mono = *self.mono.lock();
        shift(self.base_wall, self.base_mono, mono).unwrap_or(self.base_wall)
    }
}

/// Process-wide bridge between the monotonic domain and wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalAnchor {
    start_wall: DateTime<Utc>,
    start_mono: Duration,
}

impl GlobalAnchor {
    /// Reads both clocks once. Called a single time at startup.
    pub fn capture(clock: &dyn Clock) -> Self {
        Self {
            start_mono: clock.monotonic(),
            start_wall: clock.wall(),
        }
    }

    pub fn start_wall(&self) -> DateTime<Utc> {
        self.start_wall
    }

    pub fn start_mono(&self) -> Duration {
        self.start_mono
    }

    /// `(mono - start_mono) + start_wall`. Readings taken before startup
    /// (recovered from a snapshot) map to wall times before `start_wall`.
    pub fn wall_equivalent(
        &self,
        mono: Duration,
    ) -> Option<DateTime<Utc>> {
        shift(self.start_wall, self.start_mono, mono)
    }
}

fn shift(
    wall: DateTime<Utc>,
    from: Duration,
    to: Duration,
) -> Option<DateTime<Utc>> {
    if to >= from {
        wall.checked_add_signed(TimeDelta::from_std(to - from).ok()?)
    } else {
        wall.checked_sub_signed(TimeDelta::from_std(from - to).ok()?)
    }
}
