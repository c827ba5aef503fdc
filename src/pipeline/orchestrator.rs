use crate::collector::{InfoCollector, DEFAULT_WORKERS};
use crate::depcheck::DepChecker;
use crate::koji::TagInspector;
use crate::pagure::{PackageInfo, PagureSource, RPMS_NAMESPACE};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::releases::Release;
use crate::repo::RepoLoader;
use crate::report::{JsonExport, Report, ReportBuilder, WEEK_LIMIT};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub release: Release,
    /// Only check the explicitly given packages.
    pub skip_orphans: bool,
    /// Drop packages blocked in the release's Koji tag.
    pub skip_blocked: bool,
    pub max_deps: usize,
    /// Additional packages, usually ones failing to build.
    pub failed: Vec<String>,
    pub info_workers: usize,
}

impl ReportOptions {
    pub fn new(release: Release) -> Self {
        Self {
            release,
            skip_orphans: false,
            skip_blocked: true,
            max_deps: 20,
            failed: Vec::new(),
            info_workers: DEFAULT_WORKERS,
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct ReportRun {
    pub report: Report,
    /// Complete text including header, footer and timestamps.
    pub text: String,
    pub orphans: Vec<String>,
    pub unblocked: Vec<String>,
    pub infos: BTreeMap<String, PackageInfo>,
    pub json: JsonExport,
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
}

pub struct ReportOrchestrator {
    pagure: Arc<dyn PagureSource>,
    koji: Arc<dyn TagInspector>,
    loader: RepoLoader,
    progress: Arc<dyn ProgressHandler>,
}

impl ReportOrchestrator {
    pub fn new(pagure: Arc<dyn PagureSource>, koji: Arc<dyn TagInspector>, loader: RepoLoader) -> Self {
        Self {
            pagure,
            koji,
            loader,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    fn phase_started(&self, phase: &str) -> Instant {
        self.progress.on_progress(&ProgressEvent::PhaseStarted {
            phase: phase.to_string(),
        });
        Instant::now()
    }

    fn phase_complete(&self, phase: &str, start: Instant) {
        self.progress.on_progress(&ProgressEvent::PhaseComplete {
            phase: phase.to_string(),
            duration: start.elapsed(),
        });
    }

    /// Runs every phase. The dependency walk blocks a runtime worker, so
    /// this needs the multi-threaded runtime.
    pub async fn execute(&self, options: &ReportOptions) -> Result<ReportRun> {
        let start = Instant::now();
        let release = &options.release;
        self.progress.on_progress(&ProgressEvent::Started {
            release: release.name.clone(),
        });

        let phase = self.phase_started("orphans");
        let orphans: Vec<String> = if options.skip_orphans {
            Vec::new()
        } else {
            info!("Contacting pagure for list of orphans");
            self.pagure
                .orphan_packages(RPMS_NAMESPACE)
                .await
                .context("Failed to list orphaned packages")?
                .into_keys()
                .collect()
        };
        self.phase_complete("orphans", phase);

        let started = Utc::now();

        let phase = self.phase_started("koji");
        let all_packages: Vec<String> = orphans
            .iter()
            .chain(&options.failed)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let unblocked = if options.skip_blocked {
            info!(tag = %release.koji_tag, "Getting builds from koji");
            self.koji
                .unblocked_packages(&release.koji_tag, &all_packages)
                .await
                .with_context(|| format!("Failed to check blocked packages in {}", release.koji_tag))?
        } else {
            all_packages
        };
        self.progress.on_progress(&ProgressEvent::BlockedCheckComplete {
            checked: orphans.len() + options.failed.len(),
            unblocked: unblocked.len(),
        });
        self.phase_complete("koji", phase);

        let phase = self.phase_started("repository");
        info!("Setting up dependency checker");
        let packages = self
            .loader
            .load_release(&release.repo, &release.source_repo)
            .await
            .context("Failed to load repository metadata")?;
        let mut checker = DepChecker::new(&packages)?.with_progress(Arc::clone(&self.progress));
        self.phase_complete("repository", phase);

        let phase = self.phase_started("dependencies");
        info!("Calculating dependencies");
        let mut collector = InfoCollector::spawn(
            Arc::clone(&self.pagure),
            RPMS_NAMESPACE,
            options.info_workers,
            Some(Arc::clone(&self.progress)),
        );
        let (dep_map, incomplete) = tokio::task::block_in_place(|| {
            checker.recursive_deps(&unblocked, options.max_deps, |name| collector.request(name))
        });
        self.phase_complete("dependencies", phase);

        let phase = self.phase_started("maintainers");
        debug!(requested = collector.requested(), "Waiting for maintainer lookups");
        let infos = collector.finish().await;
        self.phase_complete("maintainers", phase);

        let now = Utc::now();
        let report = ReportBuilder {
            release: &release.name,
            branch: &release.pagure_branch,
            unblocked: &unblocked,
            orphans: &orphans,
            failed: &options.failed,
            dep_map: &dep_map,
            incomplete: &incomplete,
            not_in_repo: checker.not_in_repo(),
            infos: &infos,
            now,
            week_limit: WEEK_LIMIT,
        }
        .build();
        let json = JsonExport::new(&orphans, &infos, checker.dep_chain(), now);

        let finished = Utc::now();
        let text = report.full_text(started, finished);

        self.progress.on_progress(&ProgressEvent::Completed {
            total_time: start.elapsed(),
        });

        Ok(ReportRun {
            report,
            text,
            orphans,
            unblocked,
            infos,
            json,
            started,
            finished,
        })
    }
}
