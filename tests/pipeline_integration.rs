//! Pipeline integration tests
//!
//! Runs the whole report against local repositories with in-memory Pagure
//! and Koji stand-ins.

mod support;

use async_trait::async_trait;
use orphan_report::koji::{KojiError, TagInspector};
use orphan_report::pagure::{OrphanProject, PagureError, PagureSource, ProjectInfo};
use orphan_report::pipeline::{ReportOptions, ReportOrchestrator};
use orphan_report::releases::ReleaseCatalog;
use orphan_report::repo::RepoLoader;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use support::{create_repos, project_json, TestRepos};

struct FakePagure {
    orphans: Vec<&'static str>,
    projects: BTreeMap<String, ProjectInfo>,
}

impl FakePagure {
    fn new() -> Self {
        let projects = [
            project_json("orphanlib", &["orphan"], 10),
            project_json("lonely", &["orphan"], 8),
            project_json("fresh", &["orphan", "erin"], 1),
            project_json("app", &["alice"], 100),
            project_json("tool", &["bob", "carol"], 100),
        ]
        .into_iter()
        .map(|json| {
            let project: ProjectInfo = serde_json::from_value(json).unwrap();
            (project.name.clone(), project)
        })
        .collect();

        Self {
            orphans: vec!["blocked", "fresh", "lonely", "orphanlib"],
            projects,
        }
    }
}

#[async_trait]
impl PagureSource for FakePagure {
    async fn orphan_packages(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, OrphanProject>, PagureError> {
        Ok(self
            .orphans
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    OrphanProject {
                        name: name.to_string(),
                        namespace: Some(namespace.to_string()),
                        description: None,
                    },
                )
            })
            .collect())
    }

    async fn project_info(&self, _namespace: &str, name: &str) -> Result<ProjectInfo, PagureError> {
        self.projects
            .get(name)
            .cloned()
            .ok_or_else(|| PagureError::Api {
                name: name.to_string(),
                message: "Project not found".to_string(),
            })
    }
}

struct FakeKoji;

#[async_trait]
impl TagInspector for FakeKoji {
    async fn unblocked_packages(
        &self,
        _tag: &str,
        packages: &[String],
    ) -> Result<Vec<String>, KojiError> {
        Ok(packages
            .iter()
            .filter(|p| p.as_str() != "blocked")
            .cloned()
            .collect())
    }
}

fn options(repos: &TestRepos) -> ReportOptions {
    let release = ReleaseCatalog::builtin()
        .get("rawhide")
        .unwrap()
        .clone()
        .with_overrides(
            Some(repos.binary().to_str().unwrap()),
            Some(repos.source().to_str().unwrap()),
        );
    ReportOptions::new(release)
}

fn orchestrator() -> ReportOrchestrator {
    let loader = RepoLoader::new(Duration::from_secs(5), None).unwrap();
    ReportOrchestrator::new(Arc::new(FakePagure::new()), Arc::new(FakeKoji), loader)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_report() {
    let repos = create_repos();
    let run = orchestrator().execute(&options(&repos)).await.unwrap();

    assert_eq!(run.orphans, vec!["blocked", "fresh", "lonely", "orphanlib"]);
    assert_eq!(run.unblocked, vec!["fresh", "lonely", "orphanlib"]);

    let text = &run.text;
    assert!(text.starts_with("\nReport started at "));
    assert!(text.contains("Depending on: orphanlib (2), status change: "));
    assert!(text.contains("\tapp (maintained by: alice)\n"));
    assert!(text.contains("\t\tapp-2.0-1.fc40.x86_64 requires liborphan.so.1()(64bit)\n"));
    assert!(text.contains("\ttool (maintained by: bob, carol)\n"));
    assert!(text.contains("\t\ttool-3.0-1.fc40.x86_64 requires app"));
    assert!(text.contains("Affected (co)maintainers\nalice: orphanlib\nbob: orphanlib\ncarol: orphanlib\nerin: fresh\n"));
    assert!(text.contains("\nOrphans (3): fresh lonely orphanlib\n"));
    assert!(text.contains("\nOrphans (dependend on) (1): orphanlib\n"));
    assert!(text.contains("\nOrphans (rawhide) (not depended on) (2): fresh lonely\n"));
    assert!(text.contains("\nDepending packages (rawhide) (2): app tool\n"));
    assert!(text.contains("\nNot found in repo (rawhide) (2): fresh lonely\n"));
    assert!(!text.contains("FTBFS"));
    assert!(text.contains("Report finished at "));

    assert_eq!(
        run.report.addresses,
        vec![
            "alice@fedoraproject.org",
            "bob@fedoraproject.org",
            "carol@fedoraproject.org",
            "erin@fedoraproject.org",
        ]
    );
    assert_eq!(
        run.report.retire_commands,
        vec![
            "fedretire --orphan --branch rawhide -- lonely",
            "fedretire --orphan-dependent orphanlib --branch rawhide -- app",
            "fedretire --orphan --branch rawhide -- orphanlib",
            "fedretire --orphan-dependent orphanlib --branch rawhide -- tool",
            "fedretire --orphan --branch rawhide -- orphanlib",
        ]
    );

    assert_eq!(run.json.affected_packages["app"], vec!["orphanlib"]);
    assert_eq!(run.json.affected_packages["tool"], vec!["app"]);
    assert_eq!(
        run.json.status_change.keys().collect::<Vec<_>>(),
        vec!["fresh", "lonely", "orphanlib"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_max_deps_marks_incomplete() {
    let repos = create_repos();
    let mut options = options(&repos);
    options.max_deps = 1;

    let run = orchestrator().execute(&options).await.unwrap();
    assert!(run
        .text
        .contains("\tToo many dependencies for orphanlib, not all listed here\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_skip_orphans_with_failed_packages() {
    let repos = create_repos();
    let mut options = options(&repos);
    options.skip_orphans = true;
    options.skip_blocked = false;
    options.failed = vec!["tool".to_string(), "app".to_string()];

    let run = orchestrator().execute(&options).await.unwrap();
    assert!(run.orphans.is_empty());
    assert_eq!(run.unblocked, vec!["app", "tool"]);

    let text = &run.text;
    assert!(!text.contains("\nOrphans ("));
    assert!(text.contains("\nFTBFS (rawhide) (2): tool app\n"));
    assert!(text.contains("\nFTBFS (rawhide) (depended on) (1): app\n"));
    assert!(text.contains("\nFTBFS (rawhide) (not depended on) (1): tool\n"));
    assert!(run.report.retire_commands.is_empty());
    assert!(run.json.status_change.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_repository_fails() {
    let repos = create_repos();
    let mut options = options(&repos);
    options.release.repo = repos.dir.path().join("missing").display().to_string();

    let err = orchestrator().execute(&options).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load repository metadata"));
}
