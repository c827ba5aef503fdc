//! HTTP client for the dist-git (Pagure) API

use super::types::{OrphanProject, ProjectInfo, ProjectPage, ORPHAN_UID};
use super::{PagureError, PagureSource};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::util::ResponseCache;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const PAGE_SIZE: u32 = 100;
pub const MAX_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPage {
    projects: BTreeMap<String, OrphanProject>,
    pages: u32,
}

pub struct PagureClient {
    base_url: String,
    http_client: Client,
    cache: ResponseCache,
    retry_delay: Duration,
    progress: Arc<dyn ProgressHandler>,
}

impl PagureClient {
    pub fn new(base_url: &str, timeout: Duration, cache: ResponseCache) -> Result<Self, PagureError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("orphan-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| PagureError::Http {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            cache,
            retry_delay: Duration::from_secs(1),
            progress: Arc::new(NoOpHandler),
        })
    }

    /// Base delay between attempts; attempt `n` waits `n * delay`.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    fn projects_url(&self) -> String {
        format!("{}/api/0/projects", self.base_url)
    }

    /// One page of projects owned by the orphan user, plus the page count.
    pub async fn orphan_page(
        &self,
        namespace: &str,
        page: u32,
    ) -> Result<(BTreeMap<String, OrphanProject>, u32), PagureError> {
        let key = format!("orphan-page:{}:{}:{}", self.base_url, namespace, page);
        if let Some(cached) = self.cache.get::<CachedPage>(&key) {
            return Ok((cached.projects, cached.pages));
        }

        let url = self.projects_url();
        let query = [
            ("owner", ORPHAN_UID.to_string()),
            ("namespace", namespace.to_string()),
            ("page", page.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay * (attempt - 1)).await;
            }

            match self.get_page(&url, &query).await {
                Ok(page_data) => {
                    let projects: BTreeMap<_, _> = page_data
                        .projects
                        .into_iter()
                        .map(|p| (p.name.clone(), p))
                        .collect();
                    let pages = page_data.pagination.pages;
                    self.cache.put(
                        &key,
                        &CachedPage {
                            projects: projects.clone(),
                            pages,
                        },
                    );
                    return Ok((projects, pages));
                }
                Err(e @ PagureError::InvalidResponse { .. }) => return Err(e),
                Err(e) => {
                    self.progress.on_progress(&ProgressEvent::RequestRetry {
                        url: url.clone(),
                        attempt: attempt + 1,
                        error: e.to_string(),
                    });
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            debug!(error = %e, "Last orphan page error");
        }
        Err(PagureError::RetriesExhausted {
            url,
            attempts: MAX_ATTEMPTS,
        })
    }

    async fn get_page(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<ProjectPage, PagureError> {
        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| PagureError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PagureError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<ProjectPage>()
            .await
            .map_err(|e| PagureError::InvalidResponse {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl PagureSource for PagureClient {
    async fn orphan_packages(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, OrphanProject>, PagureError> {
        let key = format!("orphans:{}:{}", self.base_url, namespace);
        if let Some(cached) = self.cache.get::<BTreeMap<String, OrphanProject>>(&key) {
            debug!(count = cached.len(), "Using cached orphan listing");
            return Ok(cached);
        }

        let (mut packages, pages) = self.orphan_page(namespace, 1).await?;
        self.progress
            .on_progress(&ProgressEvent::OrphanPageFetched { page: 1, pages });

        for page in 2..=pages {
            let (more, _) = self.orphan_page(namespace, page).await?;
            packages.extend(more);
            self.progress
                .on_progress(&ProgressEvent::OrphanPageFetched { page, pages });
        }

        self.cache.put(&key, &packages);
        Ok(packages)
    }

    async fn project_info(&self, namespace: &str, name: &str) -> Result<ProjectInfo, PagureError> {
        let url = format!("{}/api/0/{}/{}", self.base_url, namespace, name);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| PagureError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| PagureError::InvalidResponse {
                    url: url.clone(),
                    message: e.to_string(),
                })?;

        if let Some(message) = body.get("error").and_then(|e| e.as_str()) {
            return Err(PagureError::Api {
                name: format!("{}/{}", namespace, name),
                message: message.to_string(),
            });
        }

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Pagure lookup failed");
            return Err(PagureError::Status {
                url,
                status: status.as_u16(),
            });
        }

        serde_json::from_value(body).map_err(|e| PagureError::InvalidResponse {
            url,
            message: e.to_string(),
        })
    }
}
