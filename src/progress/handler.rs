//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a report is being assembled
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Report generation started
    Started { release: String },

    /// A pipeline phase started
    PhaseStarted { phase: String },

    /// A pipeline phase completed
    PhaseComplete { phase: String, duration: Duration },

    /// One page of the orphan listing was fetched
    OrphanPageFetched { page: u32, pages: u32 },

    /// A remote request failed and will be retried
    RequestRetry {
        url: String,
        attempt: u32,
        error: String,
    },

    /// Koji listing checked
    BlockedCheckComplete { checked: usize, unblocked: usize },

    /// Repository metadata loaded into the package set
    RepositoryLoaded {
        label: String,
        packages: usize,
        duration: Duration,
    },

    /// Reverse dependency walk started for one package
    DependencyScanStarted { package: String },

    /// The walk for a package hit the dependency limit
    DependencyScanTruncated {
        package: String,
        dep_count: usize,
        max_deps: usize,
    },

    /// Maintainer information retrieved
    PackageInfoFetched { package: String, remaining: usize },

    /// Report generated successfully
    Completed { total_time: Duration },

    /// Report generation failed
    Failed { error: String },
}

/// Trait for handling progress events
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::Started {
            release: "rawhide".to_string(),
        });
        handler.on_progress(&ProgressEvent::OrphanPageFetched { page: 1, pages: 3 });
        handler.on_progress(&ProgressEvent::Completed {
            total_time: Duration::from_secs(5),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::DependencyScanStarted {
            package: "foo".to_string(),
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("DependencyScanStarted"));
        assert!(debug_str.contains("foo"));
    }
}
