//! Repository handles and discovery.
//!
//! [`ChannelRepository`] is the handle the monitor binary registers for each
//! repository: it hands notifications to an async consumer over a bounded
//! channel without ever blocking the router. [`discover_repositories`] finds
//! the repositories living under the shared root; [`undiscovered_repositories`]
//! narrows that to the ones a registry does not hold yet, for periodic rescans.

use std::fs;
use std::path::Path;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::{ActivityError, Result};
use crate::registry::{RepositoryHandle, RepositoryRegistry};
use crate::types::ActivityNotification;

/// Default capacity of a repository's activity queue.
pub const DEFAULT_ACTIVITY_QUEUE: usize = 256;

/// Repository handle backed by a bounded `mpsc` channel.
///
/// Notifications are queued with `try_send`, so a slow consumer surfaces as
/// [`ActivityError::Backpressure`] instead of stalling the router. The queue
/// preserves delivery order.
#[derive(Debug, Clone)]
pub struct ChannelRepository {
    name: String,
    sender: mpsc::Sender<ActivityNotification>,
}

impl ChannelRepository {
    /// Creates a handle and the receiving end of its activity queue.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ActivityNotification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::with_sender(name, sender), receiver)
    }

    /// Creates a handle that feeds an existing channel.
    #[must_use]
    pub fn with_sender(
        name: impl Into<String>,
        sender: mpsc::Sender<ActivityNotification>,
    ) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }
}

impl RepositoryHandle for ChannelRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_activity(
        &self,
        notification: &ActivityNotification,
    ) -> std::result::Result<(), ActivityError> {
        self.sender
            .try_send(notification.clone())
            .map_err(|e| match e {
                TrySendError::Full(_) => ActivityError::Backpressure,
                TrySendError::Closed(_) => ActivityError::ChannelClosed,
            })
    }
}

/// Lists the repositories directly under `root`.
///
/// A repository is an immediate subdirectory that contains `metadata_dir`
/// (for example `project-a/.git`). Names are returned sorted; entries whose
/// names are not valid UTF-8 are skipped.
///
/// # Errors
///
/// Returns an error if `root` cannot be read.
pub fn discover_repositories(root: &Path, metadata_dir: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(root)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "Skipping folder with non UTF-8 name");
            continue;
        };

        if path.join(metadata_dir).is_dir() {
            debug!(repository = %name, "Found repository");
            names.push(name.to_string());
        } else {
            debug!(path = %path.display(), "Folder has no metadata directory, skipping");
        }
    }

    names.sort();
    info!(root = %root.display(), count = names.len(), "Discovered repositories");
    Ok(names)
}

/// Lists the repositories under `root` that `registry` has no handle for.
///
/// # Errors
///
/// Returns an error if `root` cannot be read.
pub fn undiscovered_repositories(
    registry: &RepositoryRegistry,
    root: &Path,
    metadata_dir: &str,
) -> Result<Vec<String>> {
    let mut names = discover_repositories(root, metadata_dir)?;
    names.retain(|name| !registry.contains(name));
    Ok(names)
}
