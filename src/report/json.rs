//! Machine readable summary written next to the text report.

use crate::pagure::PackageInfo;
use anyhow::Context;
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonExport {
    /// Dependent source package → packages it was found depending on.
    pub affected_packages: BTreeMap<String, Vec<String>>,
    /// Orphan → time of its last ownership change.
    pub status_change: BTreeMap<String, String>,
}

impl JsonExport {
    pub fn new(
        orphans: &[String],
        infos: &BTreeMap<String, PackageInfo>,
        dep_chain: &BTreeMap<String, BTreeSet<String>>,
        now: DateTime<Utc>,
    ) -> Self {
        let status_change = orphans
            .iter()
            .filter_map(|name| {
                let info = infos.get(name)?;
                Some((name.clone(), isoformat(info.status_change(now))))
            })
            .collect();

        let affected_packages = dep_chain
            .iter()
            .map(|(source, reasons)| (source.clone(), reasons.iter().cloned().collect()))
            .collect();

        Self {
            affected_packages,
            status_change,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)
            .context("Failed to serialize JSON report")?;
        Ok(String::from_utf8(out)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write JSON report to {}", path.display()))
    }
}

/// `YYYY-MM-DDTHH:MM:SS[.ffffff]+00:00`, microseconds only when non-zero.
fn isoformat(time: DateTime<Utc>) -> String {
    let micros = time.nanosecond() / 1_000;
    if micros == 0 {
        time.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
    } else {
        format!("{}.{:06}+00:00", time.format("%Y-%m-%dT%H:%M:%S"), micros)
    }
}
