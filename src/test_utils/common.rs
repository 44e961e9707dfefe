use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;

use crate::ManualClock;
use crate::StateStore;

/// `sha512("clientkey1")`
pub const CLIENT_KEY_1_DIGEST: &str = "822295b207a0b73dd4690b60a03c55599346d44aef3da4cf28c3296eadb98b2647ae18863cc3ae8ae5574191b60360858982fd8a8d176c0edf646ce6eee24ef9";

/// Monotonic reading the test clocks start at.
pub const START_MONO: Duration = Duration::from_secs(1000);

pub fn start_wall() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MONO, start_wall()))
}

pub fn build_store(
    clock: &Arc<ManualClock>,
    client_ids: &[&str],
    wait_for_first_connection: bool,
    snapshot_path: &Path,
) -> StateStore {
    StateStore::initialize(
        clock.clone(),
        client_ids.iter().copied(),
        wait_for_first_connection,
        snapshot_path,
    )
}

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}
