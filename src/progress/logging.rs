//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { release } => {
                info!(release = %release, "Starting orphan report");
            }
            ProgressEvent::PhaseStarted { phase } => {
                info!(phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete { phase, duration } => {
                info!(
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::OrphanPageFetched { page, pages } => {
                if page % 10 == 0 || page == pages {
                    info!(progress = format!("{}/{}", page, pages), "Fetched orphan pages");
                } else {
                    debug!(progress = format!("{}/{}", page, pages), "Fetched orphan page");
                }
            }
            ProgressEvent::RequestRetry {
                url,
                attempt,
                error,
            } => {
                warn!(url = %url, attempt, error = %error, "Request failed, trying again");
            }
            ProgressEvent::BlockedCheckComplete { checked, unblocked } => {
                info!(checked, unblocked, "Koji listings checked");
            }
            ProgressEvent::RepositoryLoaded {
                label,
                packages,
                duration,
            } => {
                info!(
                    repo = %label,
                    packages,
                    duration_ms = duration.as_millis(),
                    "Repository loaded"
                );
            }
            ProgressEvent::DependencyScanStarted { package } => {
                info!(package = %package, "Getting packages depending on package");
            }
            ProgressEvent::DependencyScanTruncated {
                package,
                dep_count,
                max_deps,
            } => {
                warn!(
                    package = %package,
                    dep_count,
                    max_deps,
                    "Too many broken dependencies, dependency check not completed"
                );
            }
            ProgressEvent::PackageInfoFetched { package, remaining } => {
                debug!(package = %package, todo = remaining, "Got maintainer info");
            }
            ProgressEvent::Completed { total_time } => {
                info!(total_time_ms = total_time.as_millis(), "Report complete");
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Report generation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_logging_all_events() {
        let handler = LoggingHandler;

        let events = vec![
            ProgressEvent::Started {
                release: "rawhide".to_string(),
            },
            ProgressEvent::PhaseStarted {
                phase: "orphans".to_string(),
            },
            ProgressEvent::PhaseComplete {
                phase: "orphans".to_string(),
                duration: Duration::from_millis(20),
            },
            ProgressEvent::OrphanPageFetched { page: 10, pages: 12 },
            ProgressEvent::OrphanPageFetched { page: 11, pages: 12 },
            ProgressEvent::RequestRetry {
                url: "https://example.org".to_string(),
                attempt: 2,
                error: "HTTP 503".to_string(),
            },
            ProgressEvent::BlockedCheckComplete {
                checked: 10,
                unblocked: 7,
            },
            ProgressEvent::RepositoryLoaded {
                label: "repo".to_string(),
                packages: 100,
                duration: Duration::from_secs(1),
            },
            ProgressEvent::DependencyScanStarted {
                package: "foo".to_string(),
            },
            ProgressEvent::DependencyScanTruncated {
                package: "foo".to_string(),
                dep_count: 25,
                max_deps: 20,
            },
            ProgressEvent::PackageInfoFetched {
                package: "foo".to_string(),
                remaining: 3,
            },
            ProgressEvent::Completed {
                total_time: Duration::from_secs(5),
            },
            ProgressEvent::Failed {
                error: "Test error".to_string(),
            },
        ];

        for event in events {
            handler.on_progress(&event);
        }
    }
}
