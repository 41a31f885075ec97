//! Error types for the FolderMirror Monitor.
//!
//! Routing itself never fails: malformed paths and unknown repositories are
//! silent drops. The errors here cover the I/O shell around the router
//! (configuration, repository discovery, the root watcher) and the failures a
//! repository handle may report back.

use thiserror::Error;

use crate::config::ConfigError;
use crate::watcher::WatcherError;

/// Errors that can occur during monitor operations.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),
}

/// Failure reported by a repository handle while accepting an activity
/// notification.
///
/// The router logs these and moves on; they never stop delivery to other
/// repositories or the processing of later events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivityError {
    /// The repository refused the notification.
    #[error("repository rejected activity: {0}")]
    Rejected(String),

    /// The repository's activity queue is full.
    #[error("activity queue full")]
    Backpressure,

    /// The repository's activity queue has been closed.
    #[error("activity queue closed")]
    ChannelClosed,
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
