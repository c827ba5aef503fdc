//! Dist-git (Pagure) access: the orphan listing and per-package maintainers.

pub mod client;
pub mod types;

pub use client::PagureClient;
pub use types::{OrphanProject, PackageInfo, ProjectInfo, Timestamp, ORPHAN_UID};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Namespace holding RPM package repositories.
pub const RPMS_NAMESPACE: &str = "rpms";

#[derive(Debug, Error)]
pub enum PagureError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to fetch {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },

    #[error("Pagure reported an error for {name}: {message}")]
    Api { name: String, message: String },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

/// Source of orphan listings and project details.
#[async_trait]
pub trait PagureSource: Send + Sync {
    /// All projects in `namespace` owned by the orphan user, by name.
    async fn orphan_packages(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, OrphanProject>, PagureError>;

    async fn project_info(&self, namespace: &str, name: &str) -> Result<ProjectInfo, PagureError>;
}
