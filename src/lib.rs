//! # deadman
//!
//! A dead-man's-switch watchdog. Monitored clients send periodic heartbeats
//! over HTTP; a client that stays silent for longer than `down_interval` is
//! reported as down, and the report is repeated at most once per
//! `repeat_interval` while the silence lasts.
//!
//! ## Layout
//! - [`config`]: layered configuration (defaults, file, `DEADMAN__` env)
//! - [`core`]: client state, down detection, snapshot recovery, signals
//! - [`notify`]: best-effort notification delivery
//! - [`server`]: `POST /alive`, dashboard and `/metrics`
//!
//! ## Quick start
//! ```ignore
//! let config = AlerterConfig::load(Some("deadman.toml"))?.validate()?;
//! let store = Arc::new(StateStore::initialize(
//!     Arc::new(SystemClock::new()?),
//!     config.watch.clients.keys().cloned(),
//!     config.watch.wait_for_first_connection,
//!     &config.watch.snapshot_file,
//! ));
//! ```

pub mod config;
pub mod core;
pub mod errors;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod utils;

pub use errors::*;
pub use notify::*;
pub use self::config::*;
pub use self::core::*;
pub use server::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
