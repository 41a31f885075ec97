//! Event router: raw watcher events in, repository notifications out.
//!
//! The router classifies each [`RawChangeEvent`], looks up the owning
//! repository by exact name and calls its `on_activity` entry point. It holds
//! no per-event state, so [`EventRouter::route`] can be called from several
//! threads at once while the application adds and removes repositories.
//!
//! # Failure isolation
//!
//! A handler that returns an error or panics is logged and skipped. Other
//! handlers registered under the same name still receive the notification,
//! and later events are routed normally.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use foldermirror_monitor::classifier::PathClassifier;
//! use foldermirror_monitor::registry::RepositoryRegistry;
//! use foldermirror_monitor::repository::ChannelRepository;
//! use foldermirror_monitor::router::EventRouter;
//! use foldermirror_monitor::types::RawChangeEvent;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(RepositoryRegistry::new());
//!     let (repo, mut activity) = ChannelRepository::new("project-a", 16);
//!     registry.register(Arc::new(repo));
//!
//!     let router = EventRouter::new(PathClassifier::new("/srv/share"), Arc::clone(&registry));
//!     let (tx, rx) = mpsc::channel(100);
//!     let task = tokio::spawn(async move { router.run(rx).await });
//!
//!     tx.send(RawChangeEvent::new("project-a/docs/readme.txt")).await.unwrap();
//!     drop(tx);
//!
//!     let notification = activity.recv().await.unwrap();
//!     assert_eq!(notification.file_name, "readme.txt");
//!     let stats = task.await.unwrap();
//!     assert_eq!(stats.delivered, 1);
//! }
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::classifier::{Classification, DropReason, PathClassifier};
use crate::registry::{RepositoryHandle, RepositoryLookup};
use crate::types::{ActivityNotification, RawChangeEvent};

/// What happened to a single routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The classifier dropped the event.
    Dropped(DropReason),

    /// The event was classified but no repository has that name.
    Unmatched,

    /// Handlers registered under the name were called.
    Delivered {
        /// Handlers that accepted the notification.
        delivered: usize,
        /// Handlers that returned an error or panicked.
        failed: usize,
    },
}

/// Counters accumulated by a router since it was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// Raw events routed.
    pub received: u64,
    /// Events dropped by the classifier.
    pub dropped: u64,
    /// Forwarded events with no matching repository.
    pub unmatched: u64,
    /// Successful handler deliveries.
    pub delivered: u64,
    /// Failed handler deliveries.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    dropped: AtomicU64,
    unmatched: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RouterStats {
        RouterStats {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Routes raw change events to repository handles.
#[derive(Debug)]
pub struct EventRouter<L> {
    classifier: PathClassifier,
    repositories: L,
    counters: Counters,
}

impl<L: RepositoryLookup> EventRouter<L> {
    /// Creates a router over a repository lookup.
    pub fn new(classifier: PathClassifier, repositories: L) -> Self {
        Self {
            classifier,
            repositories,
            counters: Counters::default(),
        }
    }

    /// The classifier used for every event.
    #[must_use]
    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        self.counters.snapshot()
    }

    /// Routes one raw event.
    ///
    /// Delivers at most one notification to each handler registered under the
    /// derived repository name. Never fails; the outcome is informational.
    pub fn route(&self, event: &RawChangeEvent) -> RouteOutcome {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let (repository, notification) = match self.classifier.classify(&event.relative_path) {
            Classification::Drop(reason) => {
                trace!(path = %event.relative_path, %reason, "Dropping change event");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return RouteOutcome::Dropped(reason);
            }
            Classification::Forward {
                repository,
                notification,
            } => (repository, notification),
        };

        let handles = self.repositories.lookup(&repository);
        if handles.is_empty() {
            trace!(
                path = %event.relative_path,
                repository = %repository,
                "No repository registered for change event"
            );
            self.counters.unmatched.fetch_add(1, Ordering::Relaxed);
            return RouteOutcome::Unmatched;
        }

        let mut delivered = 0;
        let mut failed = 0;
        for handle in &handles {
            if deliver(handle.as_ref(), &notification) {
                delivered += 1;
            } else {
                failed += 1;
            }
        }

        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.counters.failed.fetch_add(failed as u64, Ordering::Relaxed);

        RouteOutcome::Delivered { delivered, failed }
    }

    /// Routes events from `receiver` until every sender has been dropped.
    ///
    /// Events are handled one at a time in arrival order, so two events for
    /// the same repository are never reordered. Returns the final counters.
    pub async fn run(&self, mut receiver: mpsc::Receiver<RawChangeEvent>) -> RouterStats {
        debug!(root = %self.classifier.root().display(), "Event router started");

        while let Some(event) = receiver.recv().await {
            self.route(&event);
        }

        let stats = self.stats();
        info!(
            received = stats.received,
            dropped = stats.dropped,
            unmatched = stats.unmatched,
            delivered = stats.delivered,
            failed = stats.failed,
            "Event router shutting down"
        );
        stats
    }
}

/// Calls one handler, containing errors and panics.
///
/// Returns `true` if the handler accepted the notification.
fn deliver(handle: &dyn RepositoryHandle, notification: &ActivityNotification) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| handle.on_activity(notification))) {
        Ok(Ok(())) => {
            debug!(
                repository = %handle.name(),
                path = %notification.absolute_path.display(),
                "Delivered file activity"
            );
            true
        }
        Ok(Err(e)) => {
            warn!(
                repository = %handle.name(),
                path = %notification.absolute_path.display(),
                error = %e,
                "Repository failed to accept file activity"
            );
            false
        }
        Err(payload) => {
            error!(
                repository = %handle.name(),
                path = %notification.absolute_path.display(),
                panic = %panic_message(payload.as_ref()),
                "Repository panicked while handling file activity"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;

    use crate::error::ActivityError;
    use crate::registry::RepositoryRegistry;

    const ROOT: &str = "/home/user/FolderMirror";

    /// Records every notification it receives.
    struct RecordingRepository {
        name: String,
        received: Mutex<Vec<ActivityNotification>>,
    }

    impl RecordingRepository {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                received: Mutex::new(Vec::new()),
            })
        }

        fn received(&self) -> Vec<ActivityNotification> {
            self.received.lock().unwrap().clone()
        }
    }

    impl RepositoryHandle for RecordingRepository {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_activity(&self, notification: &ActivityNotification) -> Result<(), ActivityError> {
            self.received.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct FailingRepository(&'static str);

    impl RepositoryHandle for FailingRepository {
        fn name(&self) -> &str {
            self.0
        }

        fn on_activity(&self, _: &ActivityNotification) -> Result<(), ActivityError> {
            Err(ActivityError::Rejected("busy".to_string()))
        }
    }

    struct PanickingRepository(&'static str);

    impl RepositoryHandle for PanickingRepository {
        fn name(&self) -> &str {
            self.0
        }

        fn on_activity(&self, _: &ActivityNotification) -> Result<(), ActivityError> {
            panic!("repository state machine exploded");
        }
    }

    fn router_with(
        handles: Vec<Arc<dyn RepositoryHandle>>,
    ) -> EventRouter<Arc<RepositoryRegistry>> {
        let registry = Arc::new(RepositoryRegistry::new());
        for handle in handles {
            registry.register(handle);
        }
        EventRouter::new(PathClassifier::new(ROOT), registry)
    }

    #[test]
    fn test_delivers_to_owning_repository_only() {
        let a = RecordingRepository::new("project-a");
        let b = RecordingRepository::new("project-b");
        let router = router_with(vec![a.clone(), b.clone()]);

        let outcome = router.route(&RawChangeEvent::new("project-a/docs/readme.txt"));

        assert_eq!(
            outcome,
            RouteOutcome::Delivered {
                delivered: 1,
                failed: 0
            }
        );
        let received = a.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].file_name, "readme.txt");
        assert_eq!(
            received[0].absolute_path,
            Path::new(ROOT).join("project-a/docs/readme.txt")
        );
        assert!(b.received().is_empty());
    }

    #[test]
    fn test_metadata_event_not_delivered() {
        let a = RecordingRepository::new("project-a");
        let router = router_with(vec![a.clone()]);

        let outcome = router.route(&RawChangeEvent::new("project-a/.git/index"));

        assert_eq!(outcome, RouteOutcome::Dropped(DropReason::Metadata));
        assert!(a.received().is_empty());
    }

    #[test]
    fn test_root_level_entry_not_delivered() {
        let a = RecordingRepository::new("project-a");
        let router = router_with(vec![a.clone()]);

        let outcome = router.route(&RawChangeEvent::new("project-a"));

        assert_eq!(outcome, RouteOutcome::Dropped(DropReason::RepositoryRoot));
        assert!(a.received().is_empty());
    }

    #[test]
    fn test_top_level_file_named_like_repository_not_delivered() {
        let a = RecordingRepository::new("project-a");
        let router = router_with(vec![a.clone()]);

        // Derives the name "project-a.pdf", which nothing is registered under.
        let outcome = router.route(&RawChangeEvent::new("project-a.pdf"));

        assert_eq!(outcome, RouteOutcome::Unmatched);
        assert!(a.received().is_empty());
        assert_eq!(router.stats().unmatched, 1);
        assert_eq!(router.stats().delivered, 0);
    }

    #[test]
    fn test_unknown_repository_is_silent() {
        let a = RecordingRepository::new("project-a");
        let router = router_with(vec![a.clone()]);

        let outcome = router.route(&RawChangeEvent::new("project-c/file.txt"));

        assert_eq!(outcome, RouteOutcome::Unmatched);
        assert!(a.received().is_empty());
        assert_eq!(router.stats().unmatched, 1);
    }

    #[test]
    fn test_duplicate_handles_each_notified() {
        let first = RecordingRepository::new("project-a");
        let second = RecordingRepository::new("project-a");
        let router = router_with(vec![first.clone(), second.clone()]);

        router.route(&RawChangeEvent::new("project-a/notes.md"));

        assert_eq!(first.received().len(), 1);
        assert_eq!(second.received().len(), 1);
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let healthy = RecordingRepository::new("project-a");
        let router = router_with(vec![
            Arc::new(FailingRepository("project-a")),
            healthy.clone(),
        ]);

        let outcome = router.route(&RawChangeEvent::new("project-a/notes.md"));

        assert_eq!(
            outcome,
            RouteOutcome::Delivered {
                delivered: 1,
                failed: 1
            }
        );
        assert_eq!(healthy.received().len(), 1);
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let healthy = RecordingRepository::new("project-a");
        let router = router_with(vec![
            Arc::new(PanickingRepository("project-a")),
            healthy.clone(),
        ]);

        let outcome = router.route(&RawChangeEvent::new("project-a/one.txt"));
        assert_eq!(
            outcome,
            RouteOutcome::Delivered {
                delivered: 1,
                failed: 1
            }
        );

        // Later events are still routed.
        router.route(&RawChangeEvent::new("project-a/two.txt"));
        let names: Vec<_> = healthy
            .received()
            .into_iter()
            .map(|n| n.file_name)
            .collect();
        assert_eq!(names, vec!["one.txt", "two.txt"]);
        assert_eq!(router.stats().failed, 2);
    }

    #[test]
    fn test_registry_changes_seen_between_events() {
        let registry = Arc::new(RepositoryRegistry::new());
        let router = EventRouter::new(PathClassifier::new(ROOT), Arc::clone(&registry));
        let event = RawChangeEvent::new("project-a/file.txt");

        assert_eq!(router.route(&event), RouteOutcome::Unmatched);

        let a = RecordingRepository::new("project-a");
        registry.register(a.clone());
        assert!(matches!(router.route(&event), RouteOutcome::Delivered { .. }));

        registry.unregister("project-a");
        assert_eq!(router.route(&event), RouteOutcome::Unmatched);
        assert_eq!(a.received().len(), 1);
    }

    #[test]
    fn test_stats_accumulate() {
        let router = router_with(vec![RecordingRepository::new("project-a")]);

        router.route(&RawChangeEvent::new("project-a/a.txt"));
        router.route(&RawChangeEvent::new("project-a/.git/HEAD"));
        router.route(&RawChangeEvent::new("project-z/a.txt"));
        router.route(&RawChangeEvent::new(""));

        assert_eq!(
            router.stats(),
            RouterStats {
                received: 4,
                dropped: 2,
                unmatched: 1,
                delivered: 1,
                failed: 0,
            }
        );
    }

    /// Blocks inside `on_activity` until its partner arrives.
    struct RendezvousRepository {
        name: &'static str,
        barrier: Arc<Barrier>,
        hits: Mutex<usize>,
    }

    impl RepositoryHandle for RendezvousRepository {
        fn name(&self) -> &str {
            self.name
        }

        fn on_activity(&self, _: &ActivityNotification) -> Result<(), ActivityError> {
            self.barrier.wait();
            *self.hits.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_concurrent_routes_do_not_block_each_other() {
        // Both deliveries must be in flight at the same time for the barrier
        // to release, so serialized routing would deadlock here.
        let barrier = Arc::new(Barrier::new(2));
        let a = Arc::new(RendezvousRepository {
            name: "project-a",
            barrier: Arc::clone(&barrier),
            hits: Mutex::new(0),
        });
        let b = Arc::new(RendezvousRepository {
            name: "project-b",
            barrier,
            hits: Mutex::new(0),
        });
        let router = router_with(vec![a.clone(), b.clone()]);

        thread::scope(|s| {
            s.spawn(|| router.route(&RawChangeEvent::new("project-a/x.txt")));
            s.spawn(|| router.route(&RawChangeEvent::new("project-b/y.txt")));
        });

        assert_eq!(*a.hits.lock().unwrap(), 1);
        assert_eq!(*b.hits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_preserves_order_and_stops_on_close() {
        let a = RecordingRepository::new("project-a");
        let router = router_with(vec![a.clone()]);
        let (tx, rx) = mpsc::channel(16);

        for name in ["1.txt", "2.txt", "3.txt"] {
            tx.send(RawChangeEvent::new(format!("project-a/{name}")))
                .await
                .unwrap();
        }
        tx.send(RawChangeEvent::new("project-a/.git/index"))
            .await
            .unwrap();
        drop(tx);

        let stats = router.run(rx).await;

        let names: Vec<_> = a.received().into_iter().map(|n| n.file_name).collect();
        assert_eq!(names, vec!["1.txt", "2.txt", "3.txt"]);
        assert_eq!(stats.received, 4);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.delivered, 3);
    }
}
