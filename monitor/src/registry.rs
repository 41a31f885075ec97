//! Live registry of repository handles.
//!
//! The application owns the registry and adds or removes repositories while
//! events are being routed. The router only sees it through the narrow
//! [`RepositoryLookup`] capability.
//!
//! # Thread Safety
//!
//! Entries live in a [`DashMap`], so registration and lookups for different
//! names proceed without a global lock. A lookup clones the handle list for a
//! name and releases the shard before returning: callers never observe a
//! half-updated entry, and a handle may freely touch the registry from inside
//! its own `on_activity` callback.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::error::ActivityError;
use crate::types::ActivityNotification;

/// A repository that can be told about file activity inside its folder.
pub trait RepositoryHandle: Send + Sync {
    /// Repository name; equal to its folder name under the shared root.
    fn name(&self) -> &str;

    /// Accepts an activity notification.
    ///
    /// Called synchronously from the routing path and must not block. Any
    /// queuing or serialization the repository needs happens behind this call.
    fn on_activity(&self, notification: &ActivityNotification) -> Result<(), ActivityError>;
}

/// Read-only lookup of repositories by exact name.
pub trait RepositoryLookup: Send + Sync {
    /// Returns a snapshot of every handle registered under `name`.
    ///
    /// An empty vector means no repository matched, which is not an error.
    fn lookup(&self, name: &str) -> Vec<Arc<dyn RepositoryHandle>>;
}

impl<T: RepositoryLookup + ?Sized> RepositoryLookup for Arc<T> {
    fn lookup(&self, name: &str) -> Vec<Arc<dyn RepositoryHandle>> {
        (**self).lookup(name)
    }
}

/// Concurrent name → handles map.
///
/// Duplicate names are allowed; every handle registered under a name receives
/// the notifications routed to it.
#[derive(Default)]
pub struct RepositoryRegistry {
    entries: DashMap<String, Vec<Arc<dyn RepositoryHandle>>>,
}

impl RepositoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle under its own name.
    ///
    /// Returns how many handles now share that name.
    pub fn register(&self, handle: Arc<dyn RepositoryHandle>) -> usize {
        let name = handle.name().to_string();
        let mut entry = self.entries.entry(name.clone()).or_default();
        entry.push(handle);
        let count = entry.len();
        drop(entry);

        debug!(repository = %name, handles = count, "Registered repository");
        count
    }

    /// Removes every handle registered under `name` and returns them.
    pub fn unregister(&self, name: &str) -> Vec<Arc<dyn RepositoryHandle>> {
        let removed = self
            .entries
            .remove(name)
            .map(|(_, handles)| handles)
            .unwrap_or_default();

        if !removed.is_empty() {
            debug!(repository = %name, handles = removed.len(), "Unregistered repository");
        }
        removed
    }

    /// Returns `true` if at least one handle is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Sorted list of registered repository names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Total number of registered handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.value().len()).sum()
    }

    /// Returns `true` if no handle is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RepositoryLookup for RepositoryRegistry {
    fn lookup(&self, name: &str) -> Vec<Arc<dyn RepositoryHandle>> {
        self.entries
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRegistry")
            .field("names", &self.names())
            .field("handles", &self.len())
            .finish()
    }
}
