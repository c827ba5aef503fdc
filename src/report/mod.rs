//! The plain text orphan report and its machine readable companion.

pub mod json;
pub mod table;
pub mod wrap;

pub use json::JsonExport;
pub use table::TextTable;
pub use wrap::{wrap_and_format, TextWrapper};

use crate::depcheck::DepMap;
use crate::pagure::{PackageInfo, ORPHAN_UID};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Weeks after which an orphan is due for retirement.
pub const WEEK_LIMIT: i64 = 6;

const TABLE_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub const HEADER: &str = "The following packages are orphaned and will be retired when they
are orphaned for six weeks, unless someone adopts them. If you know for sure
that the package should be retired, please do so now with a proper reason:
https://fedoraproject.org/wiki/How_to_remove_a_package_at_end_of_life

Note: If you received this mail directly you (co)maintain one of the affected
packages or a package that depends on one. Please adopt the affected package or
retire your depending package to avoid broken dependencies, otherwise your
package will be retired when the affected package gets retired.
";

pub const FOOTER: &str = "-- \nThis report is generated by Fedora Release Engineering.
Please report issues with it at https://pagure.io/releng/
";

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Report body, without header, footer and timestamps.
    pub text: String,
    /// Mail addresses of every affected (co)maintainer.
    pub addresses: Vec<String>,
    /// Suggested `fedretire` invocations for long orphaned packages.
    pub retire_commands: Vec<String>,
}

impl Report {
    /// The complete report as printed and mailed.
    pub fn full_text(&self, started: DateTime<Utc>, finished: DateTime<Utc>) -> String {
        format!(
            "\nReport started at {}\n\n{}\n{}{}\nReport finished at {}",
            started.format(TIMESTAMP_FORMAT),
            HEADER,
            self.text,
            FOOTER,
            finished.format(TIMESTAMP_FORMAT)
        )
    }
}

/// Everything the report is assembled from.
pub struct ReportBuilder<'a> {
    /// Release name shown next to section labels; empty to leave it out.
    pub release: &'a str,
    /// Dist-git branch for suggested retirement commands.
    pub branch: &'a str,
    pub unblocked: &'a [String],
    pub orphans: &'a [String],
    pub failed: &'a [String],
    pub dep_map: &'a DepMap,
    pub incomplete: &'a [String],
    pub not_in_repo: &'a BTreeSet<String>,
    pub infos: &'a BTreeMap<String, PackageInfo>,
    pub now: DateTime<Utc>,
    pub week_limit: i64,
}

type AffectedPeople = BTreeMap<String, BTreeSet<String>>;

impl<'a> ReportBuilder<'a> {
    fn info(&self, name: &str) -> PackageInfo {
        self.infos.get(name).cloned().unwrap_or_default()
    }

    fn release_text(&self) -> String {
        if self.release.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.release)
        }
    }

    fn depended_on(&self, name: &str) -> bool {
        self.dep_map.get(name).is_some_and(|deps| !deps.is_empty())
    }

    fn is_stale(&self, name: &str) -> bool {
        self.info(name).age_weeks(self.now) >= self.week_limit
    }

    pub fn build(&self) -> Report {
        let mut affected = AffectedPeople::new();
        let mut retire_commands = Vec::new();
        let mut text = String::new();

        text.push_str(&self.maintainer_table(&mut affected));
        text.push_str("\n\nThe following packages require above mentioned packages:\n");
        text.push_str(&self.dependency_info(&mut affected));

        text.push_str("Affected (co)maintainers\n");
        text.push_str(&maintainer_info(&affected));

        let (orphan_text, orphans, stale_depended) = self.orphan_sections(&mut retire_commands);
        text.push_str(&orphan_text);
        text.push_str(&self.breaking_sections(&orphans, &stale_depended, &mut retire_commands));
        text.push_str(&self.failed_sections());

        if !self.not_in_repo.is_empty() {
            let missing: Vec<&String> = self.not_in_repo.iter().collect();
            text.push_str(&wrap_and_format(
                &format!("Not found in repo{}", self.release_text()),
                &missing,
            ));
        }

        let addresses = affected
            .keys()
            .filter(|person| *person != ORPHAN_UID)
            .map(|person| format!("{}@fedoraproject.org", person))
            .collect();

        Report {
            text,
            addresses,
            retire_commands,
        }
    }

    fn maintainer_table(&self, affected: &mut AffectedPeople) -> String {
        let mut table =
            TextTable::new(TABLE_WIDTH).header(["Package", "(co)maintainers", "Status Change"]);

        for name in self.unblocked {
            let info = self.info(name);
            let people = info.people();
            for person in &people {
                affected
                    .entry(person.clone())
                    .or_default()
                    .insert(name.clone());
            }
            table.add_row([
                name.clone(),
                people.join(", "),
                format!("{} weeks ago", info.age_weeks(self.now)),
            ]);
        }

        table.draw()
    }

    fn dependency_info(&self, affected: &mut AffectedPeople) -> String {
        let mut text = String::new();

        for (name, sources) in self.dep_map {
            if !sources.is_empty() {
                let info = self.info(name);
                text.push_str(&format!(
                    "Depending on: {} ({}), status change: {} ({} weeks ago)\n",
                    name,
                    sources.len(),
                    info.status_change(self.now).format("%Y-%m-%d"),
                    info.age_weeks(self.now)
                ));

                for (source, binaries) in sources {
                    let people = self.info(source).people();
                    for person in &people {
                        affected
                            .entry(person.clone())
                            .or_default()
                            .insert(name.clone());
                    }
                    text.push_str(&format!(
                        "\t{} (maintained by: {})\n",
                        source,
                        people.join(", ")
                    ));
                    for (binary, provides) in binaries {
                        let provides: Vec<&str> = provides.iter().map(String::as_str).collect();
                        text.push_str(&format!("\t\t{} requires {}\n", binary, provides.join(", ")));
                    }
                    text.push('\n');
                }
            }

            if self.incomplete.contains(name) {
                text.push_str(&format!(
                    "\tToo many dependencies for {}, not all listed here\n\n",
                    name
                ));
            }
        }

        text
    }

    /// Orphan sections plus the unblocked orphans and the long orphaned
    /// ones other packages depend on.
    fn orphan_sections(&self, commands: &mut Vec<String>) -> (String, Vec<String>, Vec<String>) {
        if self.orphans.is_empty() {
            return (String::new(), Vec::new(), Vec::new());
        }

        let release = self.release_text();
        let limit = self.week_limit;
        let mut text = String::new();

        let orphans: Vec<String> = self
            .orphans
            .iter()
            .filter(|o| self.unblocked.contains(o))
            .cloned()
            .collect();
        text.push_str(&wrap_and_format("Orphans", &orphans));

        let depended: Vec<String> = orphans
            .iter()
            .filter(|o| self.depended_on(o))
            .cloned()
            .collect();
        text.push_str(&wrap_and_format("Orphans (dependend on)", &depended));

        let stale_depended: Vec<String> = depended
            .iter()
            .filter(|o| self.is_stale(o))
            .cloned()
            .collect();
        text.push_str(&wrap_and_format(
            &format!("Orphans{} for at least {} weeks (dependend on)", release, limit),
            &stale_depended,
        ));

        let not_depended: Vec<String> = orphans
            .iter()
            .filter(|o| !self.depended_on(o))
            .cloned()
            .collect();
        text.push_str(&wrap_and_format(
            &format!("Orphans{} (not depended on)", release),
            &not_depended,
        ));

        let stale_not_depended: Vec<String> = not_depended
            .iter()
            .filter(|o| self.is_stale(o))
            .cloned()
            .collect();
        if !stale_not_depended.is_empty() {
            commands.push(format!(
                "fedretire --orphan --branch {} -- {}",
                self.branch,
                stale_not_depended.join(" ")
            ));
        }
        text.push_str(&wrap_and_format(
            &format!("Orphans{} for at least {} weeks (not dependend on)", release, limit),
            &stale_not_depended,
        ));

        (text, orphans, stale_depended)
    }

    fn breaking_sections(
        &self,
        orphans: &[String],
        stale_depended: &[String],
        commands: &mut Vec<String>,
    ) -> String {
        let breaking: BTreeSet<&String> = self.dep_map.values().flat_map(|d| d.keys()).collect();
        if breaking.is_empty() {
            return String::new();
        }

        let release = self.release_text();
        let breaking: Vec<&String> = breaking.into_iter().collect();
        let mut text = wrap_and_format(&format!("Depending packages{}", release), &breaking);

        if orphans.is_empty() {
            return text;
        }

        // Dependent package → stale orphans it requires, in discovery order.
        let mut reverse_deps: Vec<(String, Vec<String>)> = Vec::new();
        let mut stale_breaking: BTreeSet<String> = BTreeSet::new();
        for package in stale_depended {
            let Some(dependers) = self.dep_map.get(package) else {
                continue;
            };
            for depender in dependers.keys() {
                match reverse_deps.iter_mut().find(|(name, _)| name == depender) {
                    Some((_, providers)) => providers.push(package.clone()),
                    None => reverse_deps.push((depender.clone(), vec![package.clone()])),
                }
                stale_breaking.insert(depender.clone());
            }
        }

        for (depender, providers) in &reverse_deps {
            commands.push(format!(
                "fedretire --orphan-dependent {} --branch {} -- {}",
                providers.join(" "),
                self.branch,
                depender
            ));
            for provider in providers {
                commands.push(format!(
                    "fedretire --orphan --branch {} -- {}",
                    self.branch, provider
                ));
            }
        }

        let stale_breaking: Vec<String> = stale_breaking.into_iter().collect();
        text.push_str(&wrap_and_format(
            &format!(
                "Packages depending on packages orphaned{} for more than {} weeks",
                release, self.week_limit
            ),
            &stale_breaking,
        ));
        text
    }

    fn failed_sections(&self) -> String {
        if self.failed.is_empty() {
            return String::new();
        }

        let label = format!("FTBFS{}", self.release_text());
        let mut text = wrap_and_format(&label, self.failed);

        let (depended, not_depended): (Vec<&String>, Vec<&String>) =
            self.failed.iter().partition(|f| self.depended_on(f));
        text.push_str(&wrap_and_format(&format!("{} (depended on)", label), &depended));
        text.push_str(&wrap_and_format(
            &format!("{} (not depended on)", label),
            &not_depended,
        ));
        text
    }
}

fn maintainer_info(affected: &AffectedPeople) -> String {
    affected
        .iter()
        .filter(|(person, _)| *person != ORPHAN_UID)
        .map(|(person, packages)| {
            let packages: Vec<&str> = packages.iter().map(String::as_str).collect();
            format!("{}: {}", person, packages.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagure::ProjectInfo;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn info(users: &[&str], weeks_ago: i64) -> PackageInfo {
        let changed = now() - chrono::Duration::weeks(weeks_ago);
        let project: ProjectInfo = serde_json::from_value(serde_json::json!({
            "name": "x",
            "access_users": {"admin": users},
            "date_modified": changed.timestamp().to_string(),
        }))
        .unwrap();
        PackageInfo::new(project)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct Fixture {
        unblocked: Vec<String>,
        orphans: Vec<String>,
        failed: Vec<String>,
        dep_map: DepMap,
        incomplete: Vec<String>,
        not_in_repo: BTreeSet<String>,
        infos: BTreeMap<String, PackageInfo>,
    }

    impl Fixture {
        /// `old` (orphaned 10 weeks) is required by `user`, `fresh`
        /// (orphaned 1 week) and `idle` (orphaned 8 weeks) are not.
        fn new() -> Self {
            let mut dep_map = DepMap::new();
            let mut sources = BTreeMap::new();
            let mut binaries: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            binaries.insert(
                "user-1.0-1.fc40.x86_64".to_string(),
                ["libold.so.1()(64bit)".to_string(), "old = 1.0-1.fc40".to_string()].into(),
            );
            sources.insert("user".to_string(), binaries);
            dep_map.insert("old".to_string(), sources);
            dep_map.insert("fresh".to_string(), BTreeMap::new());
            dep_map.insert("idle".to_string(), BTreeMap::new());
            dep_map.insert("broken".to_string(), BTreeMap::new());

            let mut infos = BTreeMap::new();
            infos.insert("old".to_string(), info(&["orphan"], 10));
            infos.insert("fresh".to_string(), info(&["orphan", "alice"], 1));
            infos.insert("idle".to_string(), info(&["orphan"], 8));
            infos.insert("broken".to_string(), info(&["bob"], 0));
            infos.insert("user".to_string(), info(&["carol", "dave"], 30));

            Self {
                unblocked: strings(&["broken", "fresh", "idle", "old"]),
                orphans: strings(&["blocked", "fresh", "idle", "old"]),
                failed: strings(&["broken"]),
                dep_map,
                incomplete: Vec::new(),
                not_in_repo: ["gone".to_string()].into(),
                infos,
            }
        }

        fn builder(&self) -> ReportBuilder<'_> {
            ReportBuilder {
                release: "rawhide",
                branch: "rawhide",
                unblocked: &self.unblocked,
                orphans: &self.orphans,
                failed: &self.failed,
                dep_map: &self.dep_map,
                incomplete: &self.incomplete,
                not_in_repo: &self.not_in_repo,
                infos: &self.infos,
                now: now(),
                week_limit: WEEK_LIMIT,
            }
        }
    }

    #[test]
    fn test_dependency_section() {
        let fixture = Fixture::new();
        let report = fixture.builder().build();

        let expected = "Depending on: old (1), status change: 2023-12-22 (10 weeks ago)\n\
            \tuser (maintained by: carol, dave)\n\
            \t\tuser-1.0-1.fc40.x86_64 requires libold.so.1()(64bit), old = 1.0-1.fc40\n\n";
        assert!(report.text.contains(expected), "{}", report.text);
        assert!(report.text.contains("The following packages require above mentioned packages:\n"));
    }

    #[test]
    fn test_affected_maintainers_exclude_orphan() {
        let fixture = Fixture::new();
        let report = fixture.builder().build();

        assert!(report.text.contains(
            "Affected (co)maintainers\nalice: fresh\nbob: broken\ncarol: old\ndave: old\n"
        ));
        assert_eq!(
            report.addresses,
            strings(&[
                "alice@fedoraproject.org",
                "bob@fedoraproject.org",
                "carol@fedoraproject.org",
                "dave@fedoraproject.org",
            ])
        );
    }

    #[test]
    fn test_orphan_sections() {
        let fixture = Fixture::new();
        let text = fixture.builder().build().text;

        assert!(text.contains("\nOrphans (3): fresh idle old\n\n"));
        assert!(text.contains("\nOrphans (dependend on) (1): old\n\n"));
        assert!(text.contains("\nOrphans (rawhide) for at least 6 weeks (dependend on) (1): old\n\n"));
        assert!(text.contains("\nOrphans (rawhide) (not depended on) (2): fresh idle\n\n"));
        assert!(text.contains(
            "\nOrphans (rawhide) for at least 6 weeks (not dependend on) (1): idle\n\n"
        ));
        assert!(text.contains("\nDepending packages (rawhide) (1): user\n\n"));
        assert!(text.contains(
            "\nPackages depending on packages orphaned (rawhide) for more than 6\n    weeks (1): user\n\n"
        ));
    }

    #[test]
    fn test_failed_and_missing_sections() {
        let fixture = Fixture::new();
        let text = fixture.builder().build().text;

        assert!(text.contains("\nFTBFS (rawhide) (1): broken\n\n"));
        assert!(text.contains("\nFTBFS (rawhide) (depended on) (0):\n\n"));
        assert!(text.contains("\nFTBFS (rawhide) (not depended on) (1): broken\n\n"));
        assert!(text.ends_with("\nNot found in repo (rawhide) (1): gone\n\n"));
    }

    #[test]
    fn test_retire_commands() {
        let fixture = Fixture::new();
        let report = fixture.builder().build();
        assert_eq!(
            report.retire_commands,
            strings(&[
                "fedretire --orphan --branch rawhide -- idle",
                "fedretire --orphan-dependent old --branch rawhide -- user",
                "fedretire --orphan --branch rawhide -- old",
            ])
        );
    }

    #[test]
    fn test_maintainer_table() {
        let fixture = Fixture::new();
        let text = fixture.builder().build().text;
        let table: Vec<&str> = text.lines().take(6).collect();

        assert!(table[0].contains("Package"));
        assert!(table[1].chars().all(|c| c == '='));
        assert!(table[2].starts_with("broken"));
        assert!(table[2].contains("bob"));
        assert!(table[2].trim_end().ends_with("0 weeks ago"));
        assert!(table[3].contains("alice, orphan"));
        assert!(table[5].trim_end().ends_with("10 weeks ago"));
    }

    #[test]
    fn test_incomplete_note() {
        let mut fixture = Fixture::new();
        fixture.incomplete = strings(&["old"]);
        let text = fixture.builder().build().text;
        assert!(text.contains("\n\n\tToo many dependencies for old, not all listed here\n\n"));
    }

    #[test]
    fn test_without_orphans_or_dependencies() {
        let infos = BTreeMap::new();
        let dep_map = DepMap::new();
        let not_in_repo = BTreeSet::new();
        let report = ReportBuilder {
            release: "",
            branch: "rawhide",
            unblocked: &[],
            orphans: &[],
            failed: &[],
            dep_map: &dep_map,
            incomplete: &[],
            not_in_repo: &not_in_repo,
            infos: &infos,
            now: now(),
            week_limit: WEEK_LIMIT,
        }
        .build();

        assert!(report.text.ends_with("Affected (co)maintainers\n"));
        assert!(report.addresses.is_empty());
        assert!(report.retire_commands.is_empty());
    }

    #[test]
    fn test_full_text_layout() {
        let report = Report {
            text: "body\n".to_string(),
            addresses: Vec::new(),
            retire_commands: Vec::new(),
        };
        let started = now();
        let finished = now() + chrono::Duration::seconds(90);
        let text = report.full_text(started, finished);

        assert!(text.starts_with("\nReport started at 2024-03-01 12:00:00 UTC\n\nThe following packages are orphaned"));
        assert!(text.contains("gets retired.\n\nbody\n-- \n"));
        assert!(text.ends_with("\nReport finished at 2024-03-01 12:01:30 UTC"));
    }
}
