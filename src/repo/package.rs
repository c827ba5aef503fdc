//! RPM package records as read from repository metadata.

use std::fmt;

/// Index of a package inside a [`super::PackageSet`].
pub type PackageId = usize;

/// Comparison flag of a versioned dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepFlag {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl DepFlag {
    pub fn parse(flag: &str) -> Option<Self> {
        match flag {
            "EQ" => Some(DepFlag::Eq),
            "LT" => Some(DepFlag::Lt),
            "LE" => Some(DepFlag::Le),
            "GT" => Some(DepFlag::Gt),
            "GE" => Some(DepFlag::Ge),
            _ => None,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            DepFlag::Eq => "=",
            DepFlag::Lt => "<",
            DepFlag::Le => "<=",
            DepFlag::Gt => ">",
            DepFlag::Ge => ">=",
        }
    }
}

/// A `provides` or `requires` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub flag: Option<DepFlag>,
    pub evr: Option<String>,
}

impl Dependency {
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flag: None,
            evr: None,
        }
    }

    pub fn versioned(name: impl Into<String>, flag: DepFlag, evr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flag: Some(flag),
            evr: Some(evr.into()),
        }
    }

    /// Boolean dependencies such as `(foo if bar)`.
    pub fn is_rich(&self) -> bool {
        self.name.starts_with('(')
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.flag, &self.evr) {
            (Some(flag), Some(evr)) => write!(f, "{} {} {}", self.name, flag.symbol(), evr),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Formats `[epoch:]version[-release]`, leaving out a zero epoch.
pub fn format_evr(epoch: Option<&str>, version: Option<&str>, release: Option<&str>) -> Option<String> {
    let version = version.filter(|v| !v.is_empty())?;
    let mut evr = String::new();
    if let Some(epoch) = epoch.filter(|e| !e.is_empty() && *e != "0") {
        evr.push_str(epoch);
        evr.push(':');
    }
    evr.push_str(version);
    if let Some(release) = release.filter(|r| !r.is_empty()) {
        evr.push('-');
        evr.push_str(release);
    }
    Some(evr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpmPackage {
    pub name: String,
    pub epoch: u32,
    pub version: String,
    pub release: String,
    pub arch: String,
    /// File name of the source rpm; empty for source packages.
    pub sourcerpm: Option<String>,
    pub provides: Vec<Dependency>,
    pub requires: Vec<Dependency>,
    pub files: Vec<String>,
    /// Checksum identifying the package across primary and filelists.
    pub pkgid: String,
}

impl RpmPackage {
    pub fn is_source(&self) -> bool {
        self.arch == "src" || self.arch == "nosrc"
    }

    /// `(name, version, release)` of the source rpm this package was built
    /// from, parsed from `name-version-release.src.rpm`.
    pub fn source_nvr(&self) -> Option<(&str, &str, &str)> {
        let sourcerpm = self.sourcerpm.as_deref()?;
        parse_source_nvr(sourcerpm)
    }
}

pub fn parse_source_nvr(sourcerpm: &str) -> Option<(&str, &str, &str)> {
    let stem = sourcerpm
        .split(".src.rpm")
        .next()
        .filter(|s| !s.is_empty())?;
    let stem = stem.strip_suffix(".nosrc.rpm").unwrap_or(stem);
    let mut parts = stem.rsplitn(3, '-');
    let release = parts.next()?;
    let version = parts.next()?;
    let name = parts.next()?;
    if name.is_empty() || version.is_empty() || release.is_empty() {
        return None;
    }
    Some((name, version, release))
}

impl fmt::Display for RpmPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch == 0 {
            write!(f, "{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
        } else {
            write!(
                f,
                "{}-{}:{}-{}.{}",
                self.name, self.epoch, self.version, self.release, self.arch
            )
        }
    }
}
