//! orphan-report - find orphaned Fedora packages that are still unblocked
//!
//! This library lists packages owned by the orphan user in dist-git, checks
//! which of them are still unblocked in the release's Koji tag, walks the
//! reverse dependencies of those packages through the release repository and
//! renders a report for the affected (co)maintainers.
//!
//! # Core Concepts
//!
//! - **Orphan**: a dist-git package whose main admin is the `orphan` user
//! - **Unblocked**: still listed and not blocked in the Koji tag, so it will
//!   be shipped unless someone retires it
//! - **Dependent**: a package built from another source package that
//!   requires a capability only the orphan provides
//!
//! # Example Usage
//!
//! ```ignore
//! use orphan_report::pipeline::{ReportOptions, ReportOrchestrator};
//! use orphan_report::releases::ReleaseCatalog;
//!
//! async fn report(orchestrator: ReportOrchestrator) -> anyhow::Result<()> {
//!     let release = ReleaseCatalog::builtin().get("rawhide")?.clone();
//!     let run = orchestrator.execute(&ReportOptions::new(release)).await?;
//!     println!("{}", run.text);
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`pagure`]: orphan listing and maintainer lookup
//! - [`koji`]: blocked package check over XML-RPC
//! - [`repo`]: repository metadata loading and the queryable package set
//! - [`depcheck`]: reverse dependency walk
//! - [`report`]: text, table and JSON rendering
//! - [`pipeline`]: the phases above run end to end

pub mod cli;
pub mod collector;
pub mod config;
pub mod depcheck;
pub mod koji;
pub mod mail;
pub mod pagure;
pub mod pipeline;
pub mod progress;
pub mod releases;
pub mod repo;
pub mod report;
pub mod util;

pub use config::{ConfigError, OrphanReportConfig};
pub use depcheck::{DepCheckError, DepChecker, DepMap};
pub use pipeline::{ReportOptions, ReportOrchestrator, ReportRun};
pub use releases::{Release, ReleaseCatalog};
pub use report::{Report, ReportBuilder};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "orphan-report");
    }
}
