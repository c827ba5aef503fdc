//! Release catalogue: where to look for packages of each Fedora/EPEL release
//! and who gets the report.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const KOJI_HUB: &str = "https://koji.fedoraproject.org/kojihub";
pub const FEDORA_DEVEL_LIST: &str = "devel@lists.fedoraproject.org";
pub const EPEL_ANNOUNCE_LIST: &str = "epel-announce@lists.fedoraproject.org";
pub const DEFAULT_RELEASE: &str = "rawhide";

const KOJIPKGS: &str = "https://kojipkgs.fedoraproject.org/compose";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(skip)]
    pub name: String,
    pub repo: String,
    pub source_repo: String,
    pub koji_tag: String,
    #[serde(default = "default_koji_hub")]
    pub koji_hub: String,
    pub pagure_branch: String,
    pub mailto: String,
    #[serde(default)]
    pub bcc: Vec<String>,
}

fn default_koji_hub() -> String {
    KOJI_HUB.to_string()
}

impl Release {
    /// Replaces the repository URLs when given on the command line.
    pub fn with_overrides(mut self, repo: Option<&str>, source_repo: Option<&str>) -> Self {
        if let Some(repo) = repo {
            self.repo = repo.to_string();
        }
        if let Some(source_repo) = source_repo {
            self.source_repo = source_repo.to_string();
        }
        self
    }

    fn epel(version: u32) -> Self {
        let base = format!("{}/updates/epel{}/compose/Everything", KOJIPKGS, version);
        Self {
            name: format!("epel{}", version),
            repo: format!("{}/x86_64/os/", base),
            source_repo: format!("{}/source/tree/", base),
            koji_tag: format!("epel{}", version),
            koji_hub: KOJI_HUB.to_string(),
            pagure_branch: format!("epel{}", version),
            mailto: EPEL_ANNOUNCE_LIST.to_string(),
            bcc: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReleaseCatalog {
    releases: BTreeMap<String, Release>,
}

#[derive(Debug, Deserialize)]
struct ReleasesFile {
    #[serde(default)]
    releases: BTreeMap<String, Release>,
}

impl ReleaseCatalog {
    pub fn builtin() -> Self {
        let rawhide = Release {
            name: "rawhide".to_string(),
            repo: format!(
                "{}/rawhide/latest-Fedora-Rawhide/compose/Everything/x86_64/os",
                KOJIPKGS
            ),
            source_repo: format!(
                "{}/rawhide/latest-Fedora-Rawhide/compose/Everything/source/tree/",
                KOJIPKGS
            ),
            koji_tag: "f40".to_string(),
            koji_hub: KOJI_HUB.to_string(),
            pagure_branch: "rawhide".to_string(),
            mailto: FEDORA_DEVEL_LIST.to_string(),
            bcc: Vec::new(),
        };
        let branched = Release {
            name: "branched".to_string(),
            repo: format!(
                "{}/branched/latest-Fedora-39/compose/Everything/x86_64/os",
                KOJIPKGS
            ),
            source_repo: format!(
                "{}/branched/latest-Fedora-39/compose/Everything/source/tree/",
                KOJIPKGS
            ),
            koji_tag: "f39".to_string(),
            koji_hub: KOJI_HUB.to_string(),
            pagure_branch: "f39".to_string(),
            mailto: FEDORA_DEVEL_LIST.to_string(),
            bcc: Vec::new(),
        };

        let releases = [rawhide, branched, Release::epel(9), Release::epel(8), Release::epel(7)]
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();

        Self { releases }
    }

    /// Adds or replaces releases from a TOML document of the form
    /// `[releases.<name>]` tables.
    pub fn merge_toml(&mut self, content: &str) -> Result<(), ConfigError> {
        let file: ReleasesFile = toml::from_str(content)?;
        for (name, mut release) in file.releases {
            release.name = name.clone();
            self.releases.insert(name, release);
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReleasesFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_toml(&content)
    }

    pub fn get(&self, name: &str) -> Result<&Release, ConfigError> {
        self.releases
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRelease {
                name: name.to_string(),
                valid: self.names().join(", "),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.releases.keys().cloned().collect()
    }
}

impl Default for ReleaseCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
