//! The watchdog core: per-client state machine, timeout detection, state
//! recovery across restarts and notification throttling.
//!
//! ## Components
//! - [`Clock`] / [`GlobalAnchor`]: monotonic time for interval math, one wall
//!   clock reading for display
//! - [`StateStore`]: the client map, snapshot recovery and per-client locking
//! - [`WatchdogLoop`]: one polling task per client
//! - [`ShutdownCoordinator`]: signal handling and the final state drain

mod clock;
mod shutdown;
mod snapshot;
mod state;
mod store;
mod watchdog;

pub use clock::*;
pub use shutdown::*;
pub use snapshot::Snapshot;
pub use snapshot::SnapshotRecord;
pub use state::*;
pub use store::*;
pub use watchdog::*;
