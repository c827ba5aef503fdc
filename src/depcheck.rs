//! Reverse dependency walk: which packages break when a source package and
//! everything built from it disappear.

use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::repo::{normalize_path, PackageId, PackageSet};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DepCheckError {
    #[error("Cannot find a source rpm for {package} (built from {sourcerpm})")]
    MissingSourceRpm { package: String, sourcerpm: String },
}

/// Dependent binary packages by source package name; the leaves are the
/// capabilities each binary requires.
pub type DependentSources = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Checked package → [`DependentSources`].
pub type DepMap = BTreeMap<String, DependentSources>;

/// A package requiring capabilities of the checked source package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    pub id: PackageId,
    /// Provide strings (e.g. `libfoo.so.1()(64bit)` or `foo = 1.0-1`) it
    /// requires.
    pub provides: BTreeSet<String>,
}

pub struct DepChecker<'a> {
    packages: &'a PackageSet,
    by_src: BTreeMap<String, Vec<PackageId>>,
    by_bin: HashMap<PackageId, String>,
    dep_chain: BTreeMap<String, BTreeSet<String>>,
    not_in_repo: BTreeSet<String>,
    progress: Arc<dyn ProgressHandler>,
}

impl<'a> DepChecker<'a> {
    /// Maps every binary package to its source package.
    pub fn new(packages: &'a PackageSet) -> Result<Self, DepCheckError> {
        let mut by_bin = HashMap::new();
        for (id, package) in packages.iter().filter(|(_, p)| !p.is_source()) {
            let srpm = packages
                .srpm_name_of(id)
                .ok_or_else(|| DepCheckError::MissingSourceRpm {
                    package: package.to_string(),
                    sourcerpm: package.sourcerpm.clone().unwrap_or_default(),
                })?;
            by_bin.insert(id, srpm.to_string());
        }

        let by_src = packages
            .binaries_by_source()
            .into_iter()
            .map(|(name, ids)| (name.to_string(), ids))
            .collect();

        Ok(Self {
            packages,
            by_src,
            by_bin,
            dep_chain: BTreeMap::new(),
            not_in_repo: BTreeSet::new(),
            progress: Arc::new(NoOpHandler),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    /// Source package → packages it was found depending on. Every checked
    /// input package has an entry, possibly empty.
    pub fn dep_chain(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.dep_chain
    }

    /// Checked source packages that have no binaries in the repository.
    pub fn not_in_repo(&self) -> &BTreeSet<String> {
        &self.not_in_repo
    }

    fn srpm_name(&self, id: PackageId) -> String {
        self.by_bin
            .get(&id)
            .cloned()
            .unwrap_or_else(|| self.packages.get(id).name.clone())
    }

    /// Packages built from other source packages that require a capability
    /// only the binaries of `srpm` provide, keyed by their NEVRA.
    ///
    /// A capability also provided by a package outside `srpm` is ignored
    /// unless that provider's name is in `ignore`.
    pub fn find_dependent_packages(
        &mut self,
        srpm: &str,
        ignore: &HashSet<String>,
    ) -> BTreeMap<String, Dependent> {
        let mut dependents: BTreeMap<String, Dependent> = BTreeMap::new();

        let Some(rpms) = self.by_src.get(srpm) else {
            warn!(package = %srpm, "Package not found in repo");
            self.not_in_repo.insert(srpm.to_string());
            return dependents;
        };

        let mut provides: Vec<String> = Vec::new();
        for &id in rpms {
            let package = self.packages.get(id);
            provides.extend(package.provides.iter().map(|p| p.to_string()));
            provides.extend(package.files.iter().map(|f| normalize_path(f)));
        }

        for provide in provides {
            let Some(base) = provide.split_whitespace().next() else {
                continue;
            };

            let elided = self.packages.providers(base).into_iter().any(|provider| {
                let name = &self.packages.get(provider).name;
                if ignore.contains(name) {
                    debug!(provider = %name, capability = %base, "Ignoring provider package");
                    false
                } else {
                    !rpms.contains(&provider)
                }
            });
            if elided {
                continue;
            }

            for &requirer in self.packages.requirers(base) {
                if rpms.contains(&requirer) {
                    continue;
                }
                dependents
                    .entry(self.packages.get(requirer).to_string())
                    .or_insert_with(|| Dependent {
                        id: requirer,
                        provides: BTreeSet::new(),
                    })
                    .provides
                    .insert(provide.clone());
            }
        }

        dependents
    }

    /// Walks reverse dependencies of every package in `packages`
    /// breadth-first, listing at most about `max_deps` dependent source
    /// packages per input.
    ///
    /// `on_touch` receives every input and every dependent source package
    /// found. Returns the dependency map and the inputs whose walk was cut
    /// short.
    pub fn recursive_deps<F>(
        &mut self,
        packages: &[String],
        max_deps: usize,
        mut on_touch: F,
    ) -> (DepMap, Vec<String>)
    where
        F: FnMut(&str),
    {
        let mut incomplete = Vec::new();

        // Binaries of the inputs never count as alternative providers;
        // dependents found later join them.
        let mut ignore: HashSet<String> = HashSet::new();
        for name in packages {
            on_touch(name.as_str());
            if let Some(ids) = self.by_src.get(name) {
                ignore.extend(ids.iter().map(|&id| self.packages.get(id).name.clone()));
            }
        }

        let mut sorted: Vec<&String> = packages.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut dep_map = DepMap::new();
        for name in sorted {
            self.dep_chain.entry(name.clone()).or_default();
            self.progress.on_progress(&ProgressEvent::DependencyScanStarted {
                package: name.clone(),
            });

            let found = dep_map.entry(name.clone()).or_default();
            let mut to_check: VecDeque<String> = VecDeque::from([name.clone()]);
            let mut seen: HashSet<String> = HashSet::new();
            let mut allow_more = true;

            while let Some(check_next) = to_check.pop_front() {
                debug!(package = %check_next, queued = to_check.len(), "Checking dependents");
                seen.insert(check_next.clone());

                let dependents = self.find_dependent_packages(&check_next, &ignore);
                if dependents.is_empty() {
                    continue;
                }

                let mut new_names: Vec<String> = Vec::new();
                let mut dependent_srpms: BTreeSet<String> = BTreeSet::new();
                for (nevra, dependent) in dependents {
                    let srpm_name = self.srpm_name(dependent.id);
                    if !to_check.contains(&srpm_name)
                        && !new_names.contains(&srpm_name)
                        && !seen.contains(&srpm_name)
                    {
                        new_names.push(srpm_name.clone());
                    }
                    found
                        .entry(srpm_name.clone())
                        .or_default()
                        .entry(nevra)
                        .or_default()
                        .extend(dependent.provides);
                    dependent_srpms.insert(srpm_name);
                }

                for srpm_name in &dependent_srpms {
                    self.dep_chain
                        .entry(srpm_name.clone())
                        .or_default()
                        .insert(check_next.clone());
                    on_touch(srpm_name.as_str());
                }
                ignore.extend(new_names.iter().cloned());

                if allow_more {
                    to_check.extend(new_names);
                    let dep_count = found
                        .keys()
                        .chain(to_check.iter())
                        .collect::<HashSet<_>>()
                        .len();
                    if dep_count > max_deps {
                        incomplete.push(name.clone());
                        self.progress.on_progress(&ProgressEvent::DependencyScanTruncated {
                            package: name.clone(),
                            dep_count,
                            max_deps,
                        });
                        allow_more = false;
                        to_check.truncate(max_deps.saturating_sub(found.len()));
                    }
                }
            }

            if !allow_more {
                info!(
                    package = %name,
                    max_deps,
                    "Too many broken dependencies, dependency check not completed"
                );
            }
        }

        (dep_map, incomplete)
    }
}
