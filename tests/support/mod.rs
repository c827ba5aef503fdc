//! Local rpm-md repositories for end-to-end runs.
//!
//! The binary repository holds `orphanlib`, `app` (requiring the orphan's
//! library) and `tool` (requiring `app`). The source repository has the
//! matching source packages plus `lonely`, which builds no binaries.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestRepos {
    pub dir: TempDir,
}

impl TestRepos {
    pub fn binary(&self) -> PathBuf {
        self.dir.path().join("os")
    }

    pub fn source(&self) -> PathBuf {
        self.dir.path().join("source")
    }
}

fn write_repo(root: &Path, primary: &str, filelists: Option<&str>) {
    let repodata = root.join("repodata");
    fs::create_dir_all(&repodata).unwrap();

    let mut repomd = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <revision>1</revision>
  <data type="primary">
    <location href="repodata/primary.xml"/>
  </data>
"#,
    );
    fs::write(repodata.join("primary.xml"), primary).unwrap();

    if let Some(filelists) = filelists {
        repomd.push_str(
            r#"  <data type="filelists">
    <location href="repodata/filelists.xml"/>
  </data>
"#,
        );
        fs::write(repodata.join("filelists.xml"), filelists).unwrap();
    }
    repomd.push_str("</repomd>\n");
    fs::write(repodata.join("repomd.xml"), repomd).unwrap();
}

fn binary_package(name: &str, version: &str, provides: &[&str], requires: &[&str]) -> String {
    let entries = |items: &[&str]| {
        items
            .iter()
            .map(|i| format!("      <rpm:entry name=\"{}\"/>\n", i))
            .collect::<String>()
    };
    format!(
        r#"<package type="rpm">
  <name>{name}</name>
  <arch>x86_64</arch>
  <version epoch="0" ver="{version}" rel="1.fc40"/>
  <checksum type="sha256" pkgid="YES">sum-{name}</checksum>
  <format>
    <rpm:sourcerpm>{name}-{version}-1.fc40.src.rpm</rpm:sourcerpm>
    <rpm:provides>
      <rpm:entry name="{name}" flags="EQ" epoch="0" ver="{version}" rel="1.fc40"/>
{provides}    </rpm:provides>
    <rpm:requires>
{requires}    </rpm:requires>
  </format>
</package>
"#,
        provides = entries(provides),
        requires = entries(requires),
    )
}

fn source_package(name: &str, version: &str) -> String {
    format!(
        r#"<package type="rpm">
  <name>{name}</name>
  <arch>src</arch>
  <version epoch="0" ver="{version}" rel="1.fc40"/>
  <checksum type="sha256" pkgid="YES">sum-{name}-src</checksum>
  <format>
    <rpm:requires>
      <rpm:entry name="gcc"/>
    </rpm:requires>
  </format>
</package>
"#
    )
}

fn metadata(packages: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="{}">
{}</metadata>
"#,
        packages.len(),
        packages.concat()
    )
}

pub fn create_repos() -> TestRepos {
    let dir = TempDir::new().unwrap();
    let repos = TestRepos { dir };

    let binaries = metadata(&[
        binary_package("orphanlib", "1.0", &["liborphan.so.1()(64bit)"], &[]),
        binary_package("app", "2.0", &[], &["liborphan.so.1()(64bit)"]),
        binary_package("tool", "3.0", &[], &["app"]),
    ]);
    let filelists = r#"<?xml version="1.0" encoding="UTF-8"?>
<filelists xmlns="http://linux.duke.edu/metadata/filelists" packages="0">
</filelists>
"#;
    write_repo(&repos.binary(), &binaries, Some(filelists));

    let sources = metadata(&[
        source_package("orphanlib", "1.0"),
        source_package("app", "2.0"),
        source_package("tool", "3.0"),
        source_package("lonely", "0.1"),
    ]);
    write_repo(&repos.source(), &sources, None);

    repos
}

/// Pagure project JSON whose ownership changed `weeks` ago.
pub fn project_json(name: &str, admins: &[&str], weeks: i64) -> serde_json::Value {
    let changed = chrono::Utc::now() - chrono::Duration::weeks(weeks) - chrono::Duration::hours(1);
    serde_json::json!({
        "name": name,
        "access_users": {"admin": admins},
        "access_groups": {},
        "date_created": "1000000000",
        "date_modified": changed.timestamp().to_string(),
    })
}
