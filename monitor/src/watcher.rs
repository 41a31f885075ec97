//! Recursive watcher over the shared root.
//!
//! Publishes one [`RawChangeEvent`] per changed path onto an `mpsc` channel,
//! with paths made relative to the root and normalized to `/` separators. The
//! event router consumes the other end of the channel.
//!
//! # Architecture
//!
//! The [`notify`] callback runs on the backend's own thread and is kept
//! lightweight: it converts paths and uses `try_send`, never blocking the
//! watcher. If the channel is full the event is dropped with a warning; the
//! repositories rescan their own trees, so a lost event is not fatal.
//!
//! Dropping the [`FileWatcher`] stops the watch and drops the sender, which
//! closes the channel and lets the router's consumer loop finish.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use tokio::sync::mpsc;
//! use foldermirror_monitor::watcher::FileWatcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let _watcher = FileWatcher::new(PathBuf::from("/home/user/FolderMirror"), tx)?;
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("changed: {}", event.relative_path);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::{Component, Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::types::{RawChangeEvent, PATH_SEPARATOR};

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The watch directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Recursive watcher publishing raw change events for one root directory.
#[derive(Debug)]
pub struct FileWatcher {
    /// Kept alive to maintain the watch subscription.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    /// The root directory being watched.
    root: PathBuf,
}

impl FileWatcher {
    /// Starts watching `root` recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or the platform watcher
    /// cannot be initialized.
    pub fn new(root: PathBuf, event_sender: mpsc::Sender<RawChangeEvent>) -> Result<Self> {
        if !root.is_dir() {
            return Err(WatcherError::DirectoryNotFound(root));
        }

        let callback_root = root.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                handle_notify_event(res, &callback_root, &event_sender);
            },
            Config::default(),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        info!(root = %root.display(), "Started recursive watch");

        Ok(Self { watcher, root })
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Handles events from the notify crate.
fn handle_notify_event(
    res: notify::Result<Event>,
    root: &Path,
    sender: &mpsc::Sender<RawChangeEvent>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "File watcher error");
            return;
        }
    };

    trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");

    if !is_change(&event.kind) {
        return;
    }

    for path in &event.paths {
        let Some(relative_path) = relative_path(root, path) else {
            trace!(path = %path.display(), "Ignoring path outside the root");
            continue;
        };

        if let Err(e) = sender.try_send(RawChangeEvent::new(relative_path)) {
            warn!(error = %e, path = %path.display(), "Failed to queue change event");
        }
    }
}

/// Creation, modification and removal count as changes; access does not.
fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => {
            true
        }
        EventKind::Access(_) | EventKind::Other => {
            debug!(?kind, "Ignoring event kind");
            false
        }
    }
}

/// Converts `path` to a `/`-separated path relative to `root`.
///
/// Returns `None` for paths outside the root, the root itself, and paths with
/// components that cannot be expressed as UTF-8.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let stripped = path.strip_prefix(root).ok()?;

    let mut segments = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }

    if segments.is_empty() {
        return None;
    }

    Some(segments.join(&PATH_SEPARATOR.to_string()))
}
