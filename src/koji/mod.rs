//! Koji hub access: which packages are still unblocked in a tag.

pub mod xmlrpc;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};
use xmlrpc::Value;

/// Calls per `system.multicall` request.
pub const MULTICALL_BATCH: usize = 1000;

#[derive(Debug, Error)]
pub enum KojiError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Koji fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("Invalid XML-RPC response: {0}")]
    InvalidResponse(String),
}

/// Answers whether packages are blocked in a tag.
#[async_trait]
pub trait TagInspector: Send + Sync {
    /// The subset of `packages` listed and not blocked in `tag`, in input
    /// order.
    async fn unblocked_packages(
        &self,
        tag: &str,
        packages: &[String],
    ) -> Result<Vec<String>, KojiError>;
}

pub struct KojiClient {
    hub_url: String,
    http_client: Client,
}

impl KojiClient {
    pub fn new(hub_url: &str, timeout: Duration) -> Result<Self, KojiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("orphan-report/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| KojiError::Http {
                url: hub_url.to_string(),
                source,
            })?;

        Ok(Self {
            hub_url: hub_url.to_string(),
            http_client,
        })
    }

    /// `listPackages(tagID=tag, pkgID=name, inherited=True)` for every
    /// package, one result per package.
    pub async fn list_packages_multicall(
        &self,
        tag: &str,
        packages: &[String],
    ) -> Result<Vec<Value>, KojiError> {
        let calls: Vec<(&str, Vec<Value>)> = packages
            .iter()
            .map(|name| {
                (
                    "listPackages",
                    vec![xmlrpc::kwargs([
                        ("tagID", Value::from(tag)),
                        ("pkgID", Value::from(name.as_str())),
                        ("inherited", Value::from(true)),
                    ])],
                )
            })
            .collect();

        let response = self.call(xmlrpc::multicall(&calls)).await?;
        match response {
            Value::Array(results) if results.len() == packages.len() => Ok(results),
            Value::Array(results) => Err(KojiError::InvalidResponse(format!(
                "expected {} multicall results, got {}",
                packages.len(),
                results.len()
            ))),
            _ => Err(KojiError::InvalidResponse(
                "multicall did not return an array".to_string(),
            )),
        }
    }

    async fn call(&self, body: String) -> Result<Value, KojiError> {
        let response = self
            .http_client
            .post(&self.hub_url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|source| KojiError::Http {
                url: self.hub_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KojiError::Status {
                url: self.hub_url.clone(),
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|source| KojiError::Http {
            url: self.hub_url.clone(),
            source,
        })?;
        xmlrpc::parse_response(&text)
    }
}

#[async_trait]
impl TagInspector for KojiClient {
    async fn unblocked_packages(
        &self,
        tag: &str,
        packages: &[String],
    ) -> Result<Vec<String>, KojiError> {
        let mut unblocked = Vec::new();
        for chunk in packages.chunks(MULTICALL_BATCH) {
            let results = self.list_packages_multicall(tag, chunk).await?;
            debug!(count = chunk.len(), "Checking listings for unblocked packages");
            unblocked.extend(select_unblocked(chunk, &results));
        }
        Ok(unblocked)
    }
}

/// Picks the unblocked packages out of multicall results.
///
/// A successful result is a one-element array holding the listing; a fault
/// is a struct. Empty listings are reported and skipped.
pub fn select_unblocked(packages: &[String], results: &[Value]) -> Vec<String> {
    let mut unblocked = Vec::new();

    for (name, result) in packages.iter().zip(results) {
        match result {
            Value::Array(wrapped) => {
                let Some(listing) = wrapped.first().and_then(Value::as_array) else {
                    error!(package = %name, "Unexpected listPackages result shape");
                    continue;
                };
                match listing.first() {
                    Some(entry) => {
                        let blocked = entry.get("blocked").and_then(Value::as_bool).unwrap_or(false);
                        if !blocked {
                            let package_name = entry
                                .get("package_name")
                                .and_then(Value::as_str)
                                .unwrap_or(name);
                            unblocked.push(package_name.to_string());
                        }
                    }
                    None => {
                        warn!(package = %name, "Package has no listing in tag");
                    }
                }
            }
            Value::Struct(_) => {
                let fault = xmlrpc::fault_error(result);
                error!(package = %name, error = %fault, "listPackages failed");
            }
            other => {
                error!(package = %name, result = ?other, "Unexpected listPackages result");
            }
        }
    }

    unblocked
}
