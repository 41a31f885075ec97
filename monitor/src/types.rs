//! Event types flowing through the FolderMirror monitor.
//!
//! Raw change events come out of the root watcher; activity notifications are
//! what a repository finally receives. Both serialize to camelCase JSON so they
//! can be printed by the `classify` command and shipped through structured logs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Separator used between segments of a [`RawChangeEvent`] path.
///
/// The watcher normalizes platform paths to this separator before publishing.
pub const PATH_SEPARATOR: char = '/';

/// Unfiltered change notification from the root watcher.
///
/// Carries no event kind: creation, modification and removal are routed the
/// same way, and events may arrive duplicated or out of order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChangeEvent {
    /// Path relative to the watched root, `/` separated.
    pub relative_path: String,
}

impl RawChangeEvent {
    /// Creates a raw event for a root-relative path.
    pub fn new(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}

/// Kind of activity reported to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Changed,
}

/// Normalized activity notification delivered to the owning repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityNotification {
    /// Always [`ActivityKind::Changed`]; the watcher does not distinguish kinds.
    pub kind: ActivityKind,

    /// Watched root joined with the event's relative path.
    pub absolute_path: PathBuf,

    /// Final segment of the relative path.
    pub file_name: String,
}

impl ActivityNotification {
    /// Creates a `Changed` notification.
    pub fn changed(absolute_path: PathBuf, file_name: impl Into<String>) -> Self {
        Self {
            kind: ActivityKind::Changed,
            absolute_path,
            file_name: file_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_event_serializes_camel_case() {
        let event = RawChangeEvent::new("project-a/readme.txt");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"relativePath":"project-a/readme.txt"}"#);
    }

    #[test]
    fn notification_serializes_kind_snake_case() {
        let notification =
            ActivityNotification::changed(PathBuf::from("/srv/share/a/b.txt"), "b.txt");
        let value = serde_json::to_value(&notification).unwrap();

        assert_eq!(value["kind"], "changed");
        assert_eq!(value["absolutePath"], "/srv/share/a/b.txt");
        assert_eq!(value["fileName"], "b.txt");
    }

    #[test]
    fn notification_deserializes() {
        let json = r#"{"kind":"changed","absolutePath":"/r/x/y.md","fileName":"y.md"}"#;
        let notification: ActivityNotification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.kind, ActivityKind::Changed);
        assert_eq!(notification.file_name, "y.md");
    }
}
