//! RPM repository metadata: download, parsing and the queryable package set.

pub mod loader;
pub mod metadata;
pub mod package;
pub mod sack;

pub use loader::RepoLoader;
pub use metadata::{DataLocation, RepoMd};
pub use package::{DepFlag, Dependency, PackageId, RpmPackage};
pub use sack::{normalize_path, PackageSet, PackageSetBuilder};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed repository metadata: {0}")]
    Metadata(String),

    #[error("repomd.xml of {repo} lists no {kind} data")]
    MissingData { repo: String, kind: String },

    #[error("Unsupported metadata compression: {0}")]
    UnsupportedCompression(String),

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Metadata parser task failed: {0}")]
    Task(String),
}
