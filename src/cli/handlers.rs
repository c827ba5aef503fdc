use super::commands::CliArgs;
use crate::config::OrphanReportConfig;
use crate::koji::KojiClient;
use crate::mail::{subject, Mail, Mailer};
use crate::pagure::PagureClient;
use crate::pipeline::{ReportOptions, ReportOrchestrator, ReportRun};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::releases::{Release, ReleaseCatalog};
use crate::repo::RepoLoader;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Applies command line overrides to the environment based configuration.
pub fn build_config(args: &CliArgs) -> OrphanReportConfig {
    let mut config = OrphanReportConfig::default();
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if args.no_cache {
        config.cache_enabled = false;
    }
    if let Some(host) = &args.smtp_host {
        config.smtp_host = host.clone();
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.to_lowercase();
    }
    config
}

/// The release to report on, with repository overrides applied.
pub fn select_release(args: &CliArgs) -> Result<Release> {
    let mut catalog = ReleaseCatalog::builtin();
    if let Some(path) = &args.releases_file {
        catalog.load_file(path)?;
    }
    let release = catalog.get(&args.release)?.clone();
    Ok(release.with_overrides(args.repo.as_deref(), args.source_repo.as_deref()))
}

/// Recipients of the report mail: To is `--mailto` or the release list, Bcc
/// is only filled when actually sending.
pub fn build_mail(args: &CliArgs, release: &Release, run: &ReportRun) -> Mail {
    let to = args
        .mailto
        .clone()
        .unwrap_or_else(|| release.mailto.clone());
    let bcc = if args.send {
        run.report
            .addresses
            .iter()
            .chain(&release.bcc)
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    Mail {
        from: args.mailfrom.clone(),
        to: vec![to],
        bcc,
        subject: subject(&release.name, run.started),
        body: run.text.clone(),
    }
}

pub async fn handle_report(args: &CliArgs) -> i32 {
    let progress: Arc<dyn ProgressHandler> = Arc::new(LoggingHandler);
    match run_report(args, Arc::clone(&progress)).await {
        Ok(()) => 0,
        Err(e) => {
            progress.on_progress(&ProgressEvent::Failed {
                error: format!("{:#}", e),
            });
            error!("{:#}", e);
            1
        }
    }
}

async fn run_report(args: &CliArgs, progress: Arc<dyn ProgressHandler>) -> Result<()> {
    let config = build_config(args);
    config.validate().context("Configuration error")?;
    debug!("{}", config);

    let release = select_release(args)?;
    debug!(release = %release.name, repo = %release.repo, source_repo = %release.source_repo, "Release selected");

    let pagure = PagureClient::new(
        &config.pagure_url,
        config.request_timeout(),
        config.response_cache(),
    )?
    .with_progress(Arc::clone(&progress));
    let koji = KojiClient::new(&release.koji_hub, config.request_timeout())?;
    let loader = RepoLoader::new(config.request_timeout(), config.repodata_dir())?
        .with_progress(Arc::clone(&progress));

    let orchestrator = ReportOrchestrator::new(Arc::new(pagure), Arc::new(koji), loader)
        .with_progress(Arc::clone(&progress));

    let mut options = ReportOptions::new(release.clone());
    options.skip_orphans = args.skip_orphans;
    options.skip_blocked = !args.no_skip_blocked;
    options.max_deps = args.max_deps;
    options.failed = args.failed.clone();

    let run = orchestrator.execute(&options).await?;
    println!("{}", run.text);

    if let Some(path) = &args.json {
        match run.json.save(path) {
            Ok(()) => info!(path = %path.display(), "JSON report written"),
            Err(e) => warn!("{:#}", e),
        }
    }

    if args.wants_mail() {
        let mail = build_mail(args, &release, &run);
        Mailer::new(config.smtp_host.as_str(), config.smtp_port)
            .send(&mail)
            .await?;
    }

    for command in &run.report.retire_commands {
        info!("{}", command);
    }
    info!(
        "Addresses ({}): {}",
        run.report.addresses.len(),
        run.report.addresses.join(", ")
    );

    Ok(())
}
