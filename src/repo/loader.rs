//! Fetches rpm-md repositories and loads them into a [`PackageSet`].
//!
//! Remote metadata is cached per repository under the repodata cache
//! directory. A cached file is reused while its digest still matches the
//! one announced by `repomd.xml`, so a new compose replaces it.

use super::metadata::{self, DataLocation, RepoMd};
use super::sack::{PackageSet, PackageSetBuilder};
use super::RepoError;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const BINARY_LABEL: &str = "repo";
pub const SOURCE_LABEL: &str = "repo-source";

const REPOMD_PATH: &str = "repodata/repomd.xml";

/// Identifier of a repository: its label plus the SHA-256 of its base URL,
/// so different URLs never share cached metadata.
pub fn repo_id(label: &str, baseurl: &str) -> String {
    format!(
        "{}-{}",
        label,
        hex::encode(Sha256::digest(baseurl.as_bytes()))
    )
}

#[derive(Debug, Clone)]
enum Location {
    Remote(String),
    Local(PathBuf),
}

impl Location {
    fn parse(baseurl: &str) -> Self {
        if let Some(path) = baseurl.strip_prefix("file://") {
            Location::Local(PathBuf::from(path))
        } else if baseurl.starts_with("http://") || baseurl.starts_with("https://") {
            Location::Remote(baseurl.trim_end_matches('/').to_string())
        } else {
            Location::Local(PathBuf::from(baseurl))
        }
    }
}

struct Repository {
    label: &'static str,
    baseurl: String,
    id: String,
    location: Location,
    repomd: RepoMd,
}

/// A metadata document ready for parsing.
enum Payload {
    Memory(Vec<u8>),
    File(PathBuf),
}

impl Payload {
    fn into_reader(self) -> Result<Box<dyn Read + Send>, RepoError> {
        match self {
            Payload::Memory(bytes) => Ok(Box::new(Cursor::new(bytes))),
            Payload::File(path) => {
                let file = fs::File::open(&path).map_err(|source| RepoError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok(Box::new(file))
            }
        }
    }
}

pub struct RepoLoader {
    http_client: Client,
    cache_dir: Option<PathBuf>,
    progress: Arc<dyn ProgressHandler>,
}

impl RepoLoader {
    /// `cache_dir` of `None` keeps downloads in memory only.
    pub fn new(timeout: Duration, cache_dir: Option<PathBuf>) -> Result<Self, RepoError> {
        let http_client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("orphan-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| RepoError::Http {
                url: String::new(),
                source,
            })?;

        Ok(Self {
            http_client,
            cache_dir,
            progress: Arc::new(NoOpHandler),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    /// Loads the binary repository with its file lists and the source
    /// repository into one package set.
    ///
    /// Only file paths some package requires are kept from the file lists.
    pub async fn load_release(&self, repo: &str, source_repo: &str) -> Result<PackageSet, RepoError> {
        let binary = self.open_repository(BINARY_LABEL, repo).await?;
        let source = self.open_repository(SOURCE_LABEL, source_repo).await?;

        let mut builder = PackageSetBuilder::new();
        for repository in [&binary, &source] {
            let started = Instant::now();
            let before = builder.len();
            let (payload, href) = self.fetch_data(repository, "primary").await?;
            builder = parse_primary(builder, payload, href).await?;
            self.progress.on_progress(&ProgressEvent::RepositoryLoaded {
                label: repository.label.to_string(),
                packages: builder.len() - before,
                duration: started.elapsed(),
            });
        }

        let (payload, href) = self.fetch_data(&binary, "filelists").await?;
        builder = parse_filelists(builder, payload, href).await?;

        let set = builder.build();
        info!(packages = set.len(), "Package set ready");
        Ok(set)
    }

    async fn open_repository(
        &self,
        label: &'static str,
        baseurl: &str,
    ) -> Result<Repository, RepoError> {
        let location = Location::parse(baseurl);
        let id = repo_id(label, baseurl);

        let xml = match &location {
            Location::Remote(base) => {
                let url = format!("{}/{}", base, REPOMD_PATH);
                let bytes = self.download(&url).await?;
                String::from_utf8(bytes)
                    .map_err(|e| RepoError::Metadata(format!("{}: {}", url, e)))?
            }
            Location::Local(root) => {
                let path = root.join(REPOMD_PATH);
                fs::read_to_string(&path).map_err(|source| RepoError::Io {
                    path: path.display().to_string(),
                    source,
                })?
            }
        };

        let repomd = RepoMd::parse(&xml)?;
        info!(
            label,
            id = %id,
            revision = repomd.revision.as_deref().unwrap_or("unknown"),
            "Opened repository"
        );

        let repository = Repository {
            label,
            baseurl: baseurl.to_string(),
            id,
            location,
            repomd,
        };

        if let Some(dir) = self.repo_cache_dir(&repository) {
            prune_stale_files(&dir, &repository.repomd);
        }

        Ok(repository)
    }

    fn repo_cache_dir(&self, repository: &Repository) -> Option<PathBuf> {
        match repository.location {
            Location::Remote(_) => self.cache_dir.as_ref().map(|d| d.join(&repository.id)),
            Location::Local(_) => None,
        }
    }

    async fn fetch_data(
        &self,
        repository: &Repository,
        kind: &str,
    ) -> Result<(Payload, String), RepoError> {
        let data = repository
            .repomd
            .location(kind)
            .ok_or_else(|| RepoError::MissingData {
                repo: repository.baseurl.clone(),
                kind: kind.to_string(),
            })?;

        let base = match &repository.location {
            Location::Local(root) => {
                return Ok((Payload::File(root.join(&data.href)), data.href.clone()));
            }
            Location::Remote(base) => base,
        };

        let url = format!("{}/{}", base, data.href);
        let cached = self
            .repo_cache_dir(repository)
            .map(|dir| dir.join(file_name(&data.href)));

        if let Some(path) = &cached {
            if cached_file_matches(path, data) {
                debug!(path = %path.display(), "Using cached repository metadata");
                return Ok((Payload::File(path.clone()), data.href.clone()));
            }
        }

        info!(url = %url, "Downloading repository metadata");
        let bytes = self.download(&url).await?;
        if let Some(expected) = sha256_checksum(data) {
            let actual = hex::encode(Sha256::digest(&bytes));
            if actual != expected {
                return Err(RepoError::ChecksumMismatch {
                    path: url,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        if let Some(path) = cached {
            store(&path, &bytes);
        }
        Ok((Payload::Memory(bytes), data.href.clone()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, RepoError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|source| RepoError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| RepoError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

fn file_name(href: &str) -> &str {
    href.rsplit('/').next().unwrap_or(href)
}

fn sha256_checksum(data: &DataLocation) -> Option<&str> {
    match data.checksum_type.as_deref() {
        Some("sha256") => data.checksum.as_deref(),
        _ => None,
    }
}

fn cached_file_matches(path: &Path, data: &DataLocation) -> bool {
    let Some(expected) = sha256_checksum(data) else {
        return false;
    };
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    let mut hasher = Sha256::new();
    if std::io::copy(&mut file, &mut hasher).is_err() {
        return false;
    }
    hex::encode(hasher.finalize()) == expected
}

fn store(path: &Path, bytes: &[u8]) {
    let result = path
        .parent()
        .map(fs::create_dir_all)
        .unwrap_or(Ok(()))
        .and_then(|_| fs::write(path, bytes));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Failed to cache repository metadata");
    }
}

/// Removes cached documents a newer `repomd.xml` no longer references.
fn prune_stale_files(dir: &Path, repomd: &RepoMd) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let referenced = repomd
            .data
            .iter()
            .any(|d| name.to_str() == Some(file_name(&d.href)));
        if !referenced {
            debug!(path = %entry.path().display(), "Removing stale repository metadata");
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!(path = %entry.path().display(), error = %e, "Failed to remove stale metadata");
            }
        }
    }
}

async fn parse_primary(
    builder: PackageSetBuilder,
    payload: Payload,
    href: String,
) -> Result<PackageSetBuilder, RepoError> {
    tokio::task::spawn_blocking(move || {
        let mut builder = builder;
        let reader = metadata::open_compressed(&href, payload.into_reader()?)?;
        metadata::read_primary(reader, &href, |package| {
            builder.add(package);
        })?;
        Ok(builder)
    })
    .await
    .map_err(|e| RepoError::Task(e.to_string()))?
}

async fn parse_filelists(
    builder: PackageSetBuilder,
    payload: Payload,
    href: String,
) -> Result<PackageSetBuilder, RepoError> {
    tokio::task::spawn_blocking(move || {
        let mut builder = builder;
        let keep = builder.required_files();
        let mut unknown = 0usize;
        let reader = metadata::open_compressed(&href, payload.into_reader()?)?;
        metadata::read_filelists(reader, &href, |pkgid, files| {
            if !builder.add_files(pkgid, files, &keep) {
                unknown += 1;
            }
        })?;
        if unknown > 0 {
            warn!(count = unknown, "File lists for packages missing from primary");
        }
        debug!(paths = keep.len(), "Attached required file paths");
        Ok(builder)
    })
    .await
    .map_err(|e| RepoError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::metadata::samples::{FILELISTS, PRIMARY};
    use std::io::Write;
    use tempfile::TempDir;

    const SOURCE_PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="2">
<package type="rpm">
  <name>foo</name>
  <arch>src</arch>
  <version epoch="0" ver="1.0" rel="1.fc40"/>
  <checksum type="sha256" pkgid="YES">sum-foo-src</checksum>
  <format>
    <rpm:requires>
      <rpm:entry name="gcc"/>
    </rpm:requires>
  </format>
</package>
<package type="rpm">
  <name>bar</name>
  <arch>src</arch>
  <version epoch="2" ver="3.1" rel="4.fc40"/>
  <checksum type="sha256" pkgid="YES">sum-bar-src</checksum>
  <format>
    <rpm:requires>
      <rpm:entry name="foo-devel"/>
    </rpm:requires>
  </format>
</package>
</metadata>
"#;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn repomd(entries: &[(&str, &str, &[u8])]) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\"?>\n<repomd xmlns=\"http://linux.duke.edu/metadata/repo\">\n<revision>1</revision>\n",
        );
        for (kind, href, bytes) in entries {
            xml.push_str(&format!(
                "<data type=\"{}\"><checksum type=\"sha256\">{}</checksum><location href=\"{}\"/></data>\n",
                kind,
                hex::encode(Sha256::digest(bytes)),
                href
            ));
        }
        xml.push_str("</repomd>\n");
        xml
    }

    fn write_local_repo(root: &Path, primary: &str, filelists: Option<&str>) {
        fs::create_dir_all(root.join("repodata")).unwrap();
        let primary_gz = gzip(primary);
        fs::write(root.join("repodata/primary.xml.gz"), &primary_gz).unwrap();
        let mut entries: Vec<(&str, &str, &[u8])> =
            vec![("primary", "repodata/primary.xml.gz", &primary_gz[..])];

        let filelists_xml;
        if let Some(filelists) = filelists {
            filelists_xml = filelists.as_bytes().to_vec();
            fs::write(root.join("repodata/filelists.xml"), &filelists_xml).unwrap();
            entries.push(("filelists", "repodata/filelists.xml", &filelists_xml[..]));
        }
        fs::write(root.join(REPOMD_PATH), repomd(&entries)).unwrap();
    }

    #[test]
    fn test_repo_id_depends_on_url() {
        let a = repo_id("repo", "https://example.org/a");
        let b = repo_id("repo", "https://example.org/b");
        assert!(a.starts_with("repo-"));
        assert_eq!(a.len(), "repo-".len() + 64);
        assert_ne!(a, b);
        assert_eq!(a, repo_id("repo", "https://example.org/a"));
    }

    #[tokio::test]
    async fn test_load_local_release() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("binary");
        let source = temp.path().join("source");
        write_local_repo(&binary, PRIMARY, Some(FILELISTS));
        write_local_repo(&source, SOURCE_PRIMARY, None);

        let loader = RepoLoader::new(Duration::from_secs(5), None).unwrap();
        let set = loader
            .load_release(
                binary.to_str().unwrap(),
                &format!("file://{}", source.display()),
            )
            .await
            .unwrap();

        assert_eq!(set.len(), 4);
        assert_eq!(set.source_package("foo", "1.0", "1.fc40"), Some(2));
        assert_eq!(set.srpm_name_of(0), Some("foo"));
        assert_eq!(set.requirers("gcc"), &[2]);

        // Nothing requires the extra files from the file list.
        assert_eq!(set.get(0).files, vec!["/usr/bin/foo"]);
    }

    #[tokio::test]
    async fn test_missing_filelists_is_an_error() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join("binary");
        write_local_repo(&binary, PRIMARY, None);

        let loader = RepoLoader::new(Duration::from_secs(5), None).unwrap();
        let path = binary.to_str().unwrap();
        let result = loader.load_release(path, path).await;
        assert!(matches!(result, Err(RepoError::MissingData { .. })));
    }

    #[tokio::test]
    async fn test_remote_metadata_is_cached() {
        let primary_gz = gzip(PRIMARY);
        let source_gz = gzip(SOURCE_PRIMARY);
        let filelists_gz = gzip(FILELISTS);

        let mut server = mockito::Server::new_async().await;
        let binary_repomd = server
            .mock("GET", "/bin/repodata/repomd.xml")
            .with_body(repomd(&[
                ("primary", "repodata/p-primary.xml.gz", &primary_gz[..]),
                ("filelists", "repodata/f-filelists.xml.gz", &filelists_gz[..]),
            ]))
            .expect(2)
            .create_async()
            .await;
        let source_repomd = server
            .mock("GET", "/src/repodata/repomd.xml")
            .with_body(repomd(&[("primary", "repodata/s-primary.xml.gz", &source_gz[..])]))
            .expect(2)
            .create_async()
            .await;
        let primary = server
            .mock("GET", "/bin/repodata/p-primary.xml.gz")
            .with_body(primary_gz.clone())
            .expect(1)
            .create_async()
            .await;
        let filelists = server
            .mock("GET", "/bin/repodata/f-filelists.xml.gz")
            .with_body(filelists_gz.clone())
            .expect(1)
            .create_async()
            .await;
        let source = server
            .mock("GET", "/src/repodata/s-primary.xml.gz")
            .with_body(source_gz.clone())
            .expect(1)
            .create_async()
            .await;

        let cache = TempDir::new().unwrap();
        let loader =
            RepoLoader::new(Duration::from_secs(5), Some(cache.path().to_path_buf())).unwrap();
        let repo = format!("{}/bin/", server.url());
        let source_repo = format!("{}/src", server.url());

        let first = loader.load_release(&repo, &source_repo).await.unwrap();
        let second = loader.load_release(&repo, &source_repo).await.unwrap();
        assert_eq!(first.len(), second.len());

        let cached = cache
            .path()
            .join(repo_id(BINARY_LABEL, &repo))
            .join("p-primary.xml.gz");
        assert!(cached.exists());

        binary_repomd.assert_async().await;
        source_repomd.assert_async().await;
        primary.assert_async().await;
        filelists.assert_async().await;
        source.assert_async().await;
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_rejected() {
        let primary_gz = gzip(PRIMARY);
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repodata/repomd.xml")
            .with_body(repomd(&[("primary", "repodata/primary.xml.gz", &b"other bytes"[..])]))
            .create_async()
            .await;
        server
            .mock("GET", "/repodata/primary.xml.gz")
            .with_body(primary_gz)
            .create_async()
            .await;

        let loader = RepoLoader::new(Duration::from_secs(5), None).unwrap();
        let result = loader.load_release(&server.url(), &server.url()).await;
        assert!(matches!(result, Err(RepoError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_prune_stale_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("old-primary.xml.gz"), b"old").unwrap();
        fs::write(temp.path().join("new-primary.xml.gz"), b"new").unwrap();

        let repomd = RepoMd {
            revision: None,
            data: vec![DataLocation {
                kind: "primary".to_string(),
                href: "repodata/new-primary.xml.gz".to_string(),
                checksum: None,
                checksum_type: None,
            }],
        };
        prune_stale_files(temp.path(), &repomd);

        assert!(!temp.path().join("old-primary.xml.gz").exists());
        assert!(temp.path().join("new-primary.xml.gz").exists());
    }
}
