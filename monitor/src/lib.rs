//! FolderMirror Monitor - routes shared-folder changes to their repositories.
//!
//! The client mirrors several independently version-controlled project folders
//! inside one shared root. A single recursive watcher covers the whole root;
//! this crate decides which repository each raw change belongs to and whether
//! it is noise, then notifies at most that repository.
//!
//! # Overview
//!
//! ```text
//! FileWatcher ──mpsc──▶ EventRouter ──▶ PathClassifier
//!                            │
//!                            └──▶ RepositoryLookup ──▶ RepositoryHandle::on_activity
//! ```
//!
//! Changes inside the version-control metadata directory and events for a
//! repository's own root-level entry are dropped. Everything else is delivered
//! as an [`ActivityNotification`] to the repository named by the first path
//! segment, if it is registered.
//!
//! # Modules
//!
//! - [`types`]: Raw change events and activity notifications
//! - [`classifier`]: Pure path classification
//! - [`registry`]: Repository handles and the concurrent registry
//! - [`router`]: Event routing and the consumer loop
//! - [`repository`]: Channel-backed handles and repository discovery
//! - [`watcher`]: Recursive `notify` watcher over the shared root
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for monitor operations

pub mod classifier;
pub mod config;
pub mod error;
pub mod registry;
pub mod repository;
pub mod router;
pub mod types;
pub mod watcher;

pub use classifier::{Classification, DropReason, PathClassifier};
pub use config::{Config, LogFormat};
pub use error::{ActivityError, MonitorError, Result};
pub use registry::{RepositoryHandle, RepositoryLookup, RepositoryRegistry};
pub use repository::{discover_repositories, undiscovered_repositories, ChannelRepository};
pub use router::{EventRouter, RouteOutcome, RouterStats};
pub use types::{ActivityKind, ActivityNotification, RawChangeEvent};
pub use watcher::{FileWatcher, WatcherError};
