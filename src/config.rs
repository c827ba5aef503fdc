//! Runtime configuration
//!
//! Settings are read from environment variables with sensible defaults; the
//! command line may override individual fields afterwards.
//!
//! # Environment Variables
//!
//! - `ORPHAN_REPORT_PAGURE_URL`: dist-git instance - default: "https://src.fedoraproject.org"
//! - `ORPHAN_REPORT_CACHE_ENABLED`: Cache the orphan listing (true|false) - default: "true"
//! - `ORPHAN_REPORT_CACHE_DIR`: Cache directory - default: user cache dir + "orphan-report"
//! - `ORPHAN_REPORT_CACHE_TTL`: Cache lifetime in seconds - default: "86400"
//! - `ORPHAN_REPORT_REQUEST_TIMEOUT`: HTTP timeout in seconds - default: "120"
//! - `ORPHAN_REPORT_SMTP_HOST`: Mail relay - default: "127.0.0.1"
//! - `ORPHAN_REPORT_SMTP_PORT`: Mail relay port - default: "25"
//! - `ORPHAN_REPORT_LOG_LEVEL`: Logging level - default: "info"

use crate::util::ResponseCache;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PAGURE_URL: &str = "https://src.fedoraproject.org";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CACHE_ENABLED: bool = true;
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SMTP_HOST: &str = "127.0.0.1";
const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown release '{name}'. Valid options: {valid}")]
    UnknownRelease { name: String, valid: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to read releases file {path}: {source}")]
    ReleasesFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse releases file: {0}")]
    ReleasesFileParse(#[from] toml::de::Error),
}

#[derive(Debug, Clone)]
pub struct OrphanReportConfig {
    pub pagure_url: String,
    pub cache_enabled: bool,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub log_level: String,
}

impl Default for OrphanReportConfig {
    fn default() -> Self {
        let pagure_url = env::var("ORPHAN_REPORT_PAGURE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_PAGURE_URL.to_string());

        let cache_enabled = env::var("ORPHAN_REPORT_CACHE_ENABLED")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(DEFAULT_CACHE_ENABLED);

        let cache_dir = env::var("ORPHAN_REPORT_CACHE_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                dirs::cache_dir()
                    .map(|d| d.join("orphan-report"))
                    .or_else(|| Some(env::temp_dir().join("orphan-report")))
            });

        let cache_ttl_secs = env::var("ORPHAN_REPORT_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        let request_timeout_secs = env::var("ORPHAN_REPORT_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let smtp_host =
            env::var("ORPHAN_REPORT_SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string());

        let smtp_port = env::var("ORPHAN_REPORT_SMTP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);

        let log_level = env::var("ORPHAN_REPORT_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            pagure_url,
            cache_enabled,
            cache_dir,
            cache_ttl_secs,
            request_timeout_secs,
            smtp_host,
            smtp_port,
            log_level,
        }
    }
}

impl OrphanReportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }

        if !(self.pagure_url.starts_with("http://") || self.pagure_url.starts_with("https://")) {
            return Err(ConfigError::ValidationFailed(format!(
                "Pagure URL must be http(s): {}",
                self.pagure_url
            )));
        }

        if self.smtp_host.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "SMTP host must not be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Cache for remote listings; disabled when caching is off or no
    /// directory could be determined.
    pub fn response_cache(&self) -> ResponseCache {
        match (&self.cache_dir, self.cache_enabled) {
            (Some(dir), true) => {
                ResponseCache::new(dir.join("pagure"), Duration::from_secs(self.cache_ttl_secs))
            }
            _ => ResponseCache::disabled(),
        }
    }

    /// Directory for downloaded repository metadata.
    pub fn repodata_dir(&self) -> Option<PathBuf> {
        if !self.cache_enabled {
            return None;
        }
        self.cache_dir.as_ref().map(|d| d.join("repodata"))
    }
}

impl fmt::Display for OrphanReportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "orphan-report configuration:")?;
        writeln!(f, "  Pagure URL: {}", self.pagure_url)?;
        writeln!(f, "  Cache Enabled: {}", self.cache_enabled)?;
        if let Some(ref dir) = self.cache_dir {
            writeln!(f, "  Cache Dir: {}", dir.display())?;
        }
        writeln!(f, "  Cache TTL: {}s", self.cache_ttl_secs)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  SMTP: {}:{}", self.smtp_host, self.smtp_port)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
