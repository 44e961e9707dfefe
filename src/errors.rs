//! Watchdog Error Hierarchy
//!
//! Defines the error types for the watchdog, categorized by the layer
//! that raises them: configuration, state persistence, notification
//! delivery and process plumbing.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration source or deserialization failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration parsed but violates a validation rule
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Client id is not part of the configured set
    #[error("Unknown client: {0}")]
    UnknownClient(String),

    /// Snapshot persistence failures
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Notification delivery failures
    #[error("Notification failed: {0}")]
    Notification(String),

    /// Process signal registration failures
    #[error("Signal handling failed: {0}")]
    Signal(#[source] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Disk I/O failures while reading or writing the snapshot
    #[error("Snapshot I/O failed at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot content is not the expected JSON document
    #[error("Snapshot at {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot serialization failure
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn notification(msg: impl Into<String>) -> Self {
        Error::Notification(msg.into())
    }
}
