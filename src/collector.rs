//! Background lookup of maintainer information while the dependency walk
//! runs.

use crate::pagure::{PackageInfo, PagureSource};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Concurrent Pagure lookups used for a report.
pub const DEFAULT_WORKERS: usize = 2;

pub struct InfoCollector {
    sender: mpsc::UnboundedSender<String>,
    requested: HashSet<String>,
    results: Arc<Mutex<BTreeMap<String, PackageInfo>>>,
    pending: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
}

impl InfoCollector {
    /// Starts `workers` tasks fetching project info from `source`.
    pub fn spawn(
        source: Arc<dyn PagureSource>,
        namespace: &str,
        workers: usize,
        progress: Option<Arc<dyn ProgressHandler>>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<String>();
        let receiver = Arc::new(Mutex::new(receiver));
        let results = Arc::new(Mutex::new(BTreeMap::new()));
        let pending = Arc::new(AtomicUsize::new(0));
        let progress = progress.unwrap_or_else(|| Arc::new(NoOpHandler) as Arc<dyn ProgressHandler>);

        let workers = (0..workers.max(1))
            .map(|_| {
                let source = Arc::clone(&source);
                let receiver = Arc::clone(&receiver);
                let results = Arc::clone(&results);
                let pending = Arc::clone(&pending);
                let progress = Arc::clone(&progress);
                let namespace = namespace.to_string();

                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(name) = next else {
                            break;
                        };

                        let info = match source.project_info(&namespace, &name).await {
                            Ok(project) => PackageInfo::new(project),
                            Err(e) => {
                                warn!(package = %name, error = %e, "Failed to get Pagure info");
                                PackageInfo::missing()
                            }
                        };
                        results.lock().await.insert(name.clone(), info);

                        let remaining = pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
                        progress.on_progress(&ProgressEvent::PackageInfoFetched {
                            package: name,
                            remaining,
                        });
                    }
                })
            })
            .collect();

        Self {
            sender,
            requested: HashSet::new(),
            results,
            pending,
            workers,
        }
    }

    /// Queues a lookup for `name` unless it was requested before.
    pub fn request(&mut self, name: &str) {
        if !self.requested.insert(name.to_string()) {
            return;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(name.to_string()).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(package = %name, "Info workers are gone, lookup dropped");
        }
    }

    pub fn requested(&self) -> usize {
        self.requested.len()
    }

    /// Waits for every queued lookup and returns the collected info.
    pub async fn finish(self) -> BTreeMap<String, PackageInfo> {
        let Self {
            sender,
            results,
            workers,
            ..
        } = self;
        drop(sender);

        debug!("Waiting for (co)maintainer information");
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Info worker failed");
            }
        }

        let mut results = results.lock().await;
        std::mem::take(&mut *results)
    }
}
