//! Path classification for raw change events.
//!
//! Decides, for a path relative to the shared root, whether the change is
//! version-control bookkeeping, a repository's own root-level entry, or a
//! genuine content change that belongs to a repository.
//!
//! # Rules
//!
//! Applied in order:
//!
//! 1. An empty path is dropped.
//! 2. A path containing the metadata marker (`.git` by default) anywhere is
//!    dropped. Sync operations write there constantly; forwarding those writes
//!    would retrigger the sync that produced them.
//! 3. The repository name is the first segment. If the final segment with its
//!    extension stripped equals that name, the event is the repository's own
//!    root-level entry and is dropped.
//! 4. A path with an empty repository or file segment (a leading or trailing
//!    `/`) is dropped, as is a file name starting with a configured ignore
//!    prefix.
//! 5. Everything else is forwarded to the named repository.
//!
//! Rule 3 also drops a nested file named after its repository, such as
//! `project-a/docs/project-a.txt`. That matches the behaviour the rest of the
//! client was built against and is kept as is. A top-level file such as
//! `project-a.pdf` has no separator, so its whole name is the repository name;
//! it is forwarded under `project-a.pdf` and reaches no repository folder.
//!
//! # Example
//!
//! ```
//! use foldermirror_monitor::classifier::{Classification, DropReason, PathClassifier};
//!
//! let classifier = PathClassifier::new("/home/user/FolderMirror");
//!
//! assert_eq!(
//!     classifier.classify("project-a/.git/index"),
//!     Classification::Drop(DropReason::Metadata)
//! );
//!
//! match classifier.classify("project-a/docs/readme.txt") {
//!     Classification::Forward { repository, notification } => {
//!         assert_eq!(repository, "project-a");
//!         assert_eq!(notification.file_name, "readme.txt");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::types::{ActivityNotification, PATH_SEPARATOR};

/// Metadata directory marker used when none is configured.
pub const DEFAULT_METADATA_MARKER: &str = ".git";

/// Why a raw event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Empty path, or no repository or file segment could be extracted.
    Malformed,
    /// Inside the version-control metadata directory.
    Metadata,
    /// The repository's own root-level entry.
    RepositoryRoot,
    /// File name matches a configured ignore prefix.
    Ignored,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Malformed => "malformed",
            Self::Metadata => "metadata",
            Self::RepositoryRoot => "repository_root",
            Self::Ignored => "ignored",
        };
        f.write_str(reason)
    }
}

/// Result of classifying a relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum Classification {
    /// The event must not reach any repository.
    Drop(DropReason),

    /// The event belongs to `repository`.
    Forward {
        repository: String,
        notification: ActivityNotification,
    },
}

impl Classification {
    /// Returns `true` for [`Classification::Drop`].
    #[must_use]
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Drop(_))
    }
}

/// Pure classifier for paths relative to the shared root.
///
/// Holds only immutable configuration, so one instance can be shared across
/// threads and called concurrently.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    root: PathBuf,
    metadata_marker: String,
    ignored_prefixes: Vec<String>,
}

impl PathClassifier {
    /// Creates a classifier for `root` using [`DEFAULT_METADATA_MARKER`] and no
    /// ignore prefixes.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata_marker: DEFAULT_METADATA_MARKER.to_string(),
            ignored_prefixes: Vec::new(),
        }
    }

    /// Replaces the metadata marker.
    ///
    /// An empty marker would match every path, so it is ignored.
    #[must_use]
    pub fn with_metadata_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.is_empty() {
            self.metadata_marker = marker;
        }
        self
    }

    /// Drops events whose file name starts with any of `prefixes`.
    #[must_use]
    pub fn with_ignored_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_prefixes = prefixes
            .into_iter()
            .map(Into::<String>::into)
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    /// The watched root that notifications are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The metadata marker in use.
    #[must_use]
    pub fn metadata_marker(&self) -> &str {
        &self.metadata_marker
    }

    /// Classifies a path relative to the root.
    #[must_use]
    pub fn classify(&self, relative_path: &str) -> Classification {
        if relative_path.is_empty() {
            return Classification::Drop(DropReason::Malformed);
        }

        if relative_path.contains(self.metadata_marker.as_str()) {
            return Classification::Drop(DropReason::Metadata);
        }

        let candidate = repository_segment(relative_path);
        let file_name = file_name(relative_path);

        if strip_extension(file_name) == candidate {
            return Classification::Drop(DropReason::RepositoryRoot);
        }

        let repository = candidate.trim_matches(PATH_SEPARATOR);
        if repository.is_empty() || file_name.is_empty() {
            return Classification::Drop(DropReason::Malformed);
        }

        if self
            .ignored_prefixes
            .iter()
            .any(|prefix| file_name.starts_with(prefix.as_str()))
        {
            return Classification::Drop(DropReason::Ignored);
        }

        Classification::Forward {
            repository: repository.to_string(),
            notification: ActivityNotification::changed(
                self.root.join(relative_path),
                file_name,
            ),
        }
    }
}

/// Everything before the first separator, or the whole path.
fn repository_segment(relative_path: &str) -> &str {
    match relative_path.find(PATH_SEPARATOR) {
        Some(idx) => &relative_path[..idx],
        None => relative_path,
    }
}

/// Everything after the last separator.
fn file_name(relative_path: &str) -> &str {
    match relative_path.rfind(PATH_SEPARATOR) {
        Some(idx) => &relative_path[idx + 1..],
        None => relative_path,
    }
}

/// Removes the last `.ext` from a file name, if any.
fn strip_extension(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name,
    }
}
