//! End-to-end report generation: orphan listing, Koji check, repository
//! load, dependency walk, maintainer lookup and rendering.

pub mod orchestrator;

pub use orchestrator::{ReportOptions, ReportOrchestrator, ReportRun};
