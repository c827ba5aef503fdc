//! In-memory package set with capability indexes.

use super::package::{PackageId, RpmPackage};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Collapses repeated slashes and `.`/`..` components of an absolute path.
///
/// Some packages list files as `//usr/...`; those must compare equal to the
/// canonical spelling.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Accumulates packages from one or more repositories.
#[derive(Debug, Default)]
pub struct PackageSetBuilder {
    packages: Vec<RpmPackage>,
    by_pkgid: HashMap<String, PackageId>,
}

impl PackageSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, package: RpmPackage) -> PackageId {
        let id = self.packages.len();
        self.by_pkgid.insert(package.pkgid.clone(), id);
        self.packages.push(package);
        id
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Paths some package requires. Only these file provides can ever
    /// matter for dependency checks.
    pub fn required_files(&self) -> HashSet<String> {
        self.packages
            .iter()
            .flat_map(|p| p.requires.iter())
            .filter(|d| d.name.starts_with('/'))
            .map(|d| normalize_path(&d.name))
            .collect()
    }

    /// Attaches filelist entries to the package with checksum `pkgid`,
    /// keeping only paths in `keep`. Returns false for unknown packages.
    pub fn add_files(&mut self, pkgid: &str, files: Vec<String>, keep: &HashSet<String>) -> bool {
        let Some(&id) = self.by_pkgid.get(pkgid) else {
            return false;
        };
        let package = &mut self.packages[id];
        let known: HashSet<String> = package.files.iter().map(|f| normalize_path(f)).collect();
        for file in files {
            let normalized = normalize_path(&file);
            if keep.contains(&normalized) && !known.contains(&normalized) {
                package.files.push(file);
            }
        }
        true
    }

    pub fn build(self) -> PackageSet {
        PackageSet::from_packages(self.packages)
    }
}

#[derive(Debug, Default)]
pub struct PackageSet {
    packages: Vec<RpmPackage>,
    by_provide: HashMap<String, Vec<PackageId>>,
    by_require: HashMap<String, Vec<PackageId>>,
    by_file: HashMap<String, Vec<PackageId>>,
    sources: HashMap<(String, String, String), PackageId>,
}

impl PackageSet {
    pub fn from_packages(packages: Vec<RpmPackage>) -> Self {
        let mut set = Self {
            packages,
            ..Default::default()
        };

        for (id, package) in set.packages.iter().enumerate() {
            let mut required = HashSet::new();
            for dep in package.requires.iter().filter(|d| !d.is_rich()) {
                if required.insert(dep.name.as_str()) {
                    set.by_require.entry(dep.name.clone()).or_default().push(id);
                }
            }

            // Source packages are not installable and provide nothing.
            if package.is_source() {
                set.sources.insert(
                    (
                        package.name.clone(),
                        package.version.clone(),
                        package.release.clone(),
                    ),
                    id,
                );
                continue;
            }

            let mut provided = HashSet::new();
            for dep in package.provides.iter().filter(|d| !d.is_rich()) {
                if provided.insert(dep.name.as_str()) {
                    set.by_provide.entry(dep.name.clone()).or_default().push(id);
                }
            }

            let mut files = HashSet::new();
            for file in &package.files {
                let normalized = normalize_path(file);
                if files.insert(normalized.clone()) {
                    set.by_file.entry(normalized).or_default().push(id);
                }
            }
        }

        set
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, id: PackageId) -> &RpmPackage {
        &self.packages[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (PackageId, &RpmPackage)> {
        self.packages.iter().enumerate()
    }

    /// Packages providing capability `cap`, either by a provide of that
    /// name or, for absolute paths, by shipping the file.
    pub fn providers(&self, cap: &str) -> Vec<PackageId> {
        let mut ids: Vec<PackageId> = self.by_provide.get(cap).cloned().unwrap_or_default();
        if cap.starts_with('/') {
            if let Some(owners) = self.by_file.get(&normalize_path(cap)) {
                ids.extend(owners);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Packages with a requirement named `cap`.
    pub fn requirers(&self, cap: &str) -> &[PackageId] {
        self.by_require.get(cap).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn source_package(&self, name: &str, version: &str, release: &str) -> Option<PackageId> {
        self.sources
            .get(&(name.to_string(), version.to_string(), release.to_string()))
            .copied()
    }

    /// Name of the source package `id` was built from. Source packages
    /// name themselves; `None` when the source rpm is not in the set.
    pub fn srpm_name_of(&self, id: PackageId) -> Option<&str> {
        let package = self.get(id);
        if package.is_source() {
            return Some(&package.name);
        }
        let (name, version, release) = package.source_nvr()?;
        self.source_package(name, version, release)
            .map(|src| self.get(src).name.as_str())
    }

    /// Binary packages grouped by the name of their source package.
    /// Binaries whose source rpm is missing are left out.
    pub fn binaries_by_source(&self) -> BTreeMap<&str, Vec<PackageId>> {
        let mut by_source: BTreeMap<&str, Vec<PackageId>> = BTreeMap::new();
        for (id, package) in self.iter() {
            if package.is_source() {
                continue;
            }
            if let Some(name) = self.srpm_name_of(id) {
                by_source.entry(name).or_default().push(id);
            }
        }
        by_source
    }
}
