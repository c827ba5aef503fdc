//! Pagure API payloads and the per-package maintainer record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Login of the pseudo-user owning orphaned packages.
pub const ORPHAN_UID: &str = "orphan";

/// One entry of the orphan listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanProject {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectPage {
    pub projects: Vec<OrphanProject>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    pub pages: u32,
}

/// Pagure encodes timestamps as strings of Unix seconds, older instances as
/// plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Text(String),
    Number(f64),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let seconds = match self {
            Timestamp::Text(s) => s.trim().parse::<f64>().ok()?,
            Timestamp::Number(n) => *n,
        };
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round() as u32;
        DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999))
    }
}

/// Project details as returned by `/api/0/<namespace>/<name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default)]
    pub access_users: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub access_groups: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub date_created: Option<Timestamp>,
    #[serde(default)]
    pub date_modified: Option<Timestamp>,
}

impl ProjectInfo {
    /// Everyone with any kind of access, users and groups alike.
    pub fn people(&self) -> Vec<String> {
        self.access_users
            .values()
            .chain(self.access_groups.values())
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// When the project last changed hands. Pagure only bumps
    /// `date_modified` on ownership changes, so it is preferred when present.
    pub fn status_change(&self) -> Option<DateTime<Utc>> {
        self.date_modified
            .as_ref()
            .or(self.date_created.as_ref())
            .and_then(Timestamp::to_datetime)
    }
}

/// Maintainer information for a package, possibly unavailable when the
/// lookup failed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackageInfo {
    project: Option<ProjectInfo>,
}

impl PackageInfo {
    pub fn new(project: ProjectInfo) -> Self {
        Self {
            project: Some(project),
        }
    }

    pub fn missing() -> Self {
        Self { project: None }
    }

    pub fn project(&self) -> Option<&ProjectInfo> {
        self.project.as_ref()
    }

    pub fn people(&self) -> Vec<String> {
        self.project.as_ref().map(|p| p.people()).unwrap_or_default()
    }

    /// Status change date, `now` when unknown.
    pub fn status_change(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.project
            .as_ref()
            .and_then(ProjectInfo::status_change)
            .unwrap_or(now)
    }

    /// Whole weeks since the status change.
    pub fn age_weeks(&self, now: DateTime<Utc>) -> i64 {
        (now - self.status_change(now)).num_days().div_euclid(7)
    }
}
