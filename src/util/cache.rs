//! On-disk JSON cache for slow remote listings.
//!
//! Entries are files named after the SHA-256 of their key; freshness is
//! decided by file modification time against the configured TTL.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            enabled: true,
        }
    }

    /// A cache that never hits and never writes.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            ttl: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(format!("{}.json", digest))
    }

    /// Returns the cached value for `key` if present, fresh and decodable.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }

        let path = self.path_for(key);
        match Self::is_fresh(&path, self.ttl) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!(key, error = %e, "Cache entry unusable");
                return None;
            }
        }

        let data = fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(value) => {
                debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupt cache entry");
                None
            }
        }
    }

    /// Stores `value` under `key`. Failures are logged and otherwise ignored.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        if !self.enabled {
            return;
        }

        if let Err(e) = self.try_put(key, value) {
            warn!(key, error = %e, "Failed to write cache entry");
        }
    }

    fn try_put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        let path = self.path_for(key);
        let data = serde_json::to_vec(value).context("Failed to serialize cache entry")?;
        fs::write(&path, data)
            .with_context(|| format!("Failed to write cache entry to {}", path.display()))?;
        Ok(())
    }

    fn is_fresh(path: &Path, ttl: Duration) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        let modified = fs::metadata(path)
            .context("Failed to read cache metadata")?
            .modified()
            .context("Failed to get cache modification time")?;
        let elapsed = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        Ok(elapsed < ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip_within_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(60));

        let mut value = BTreeMap::new();
        value.insert("foo".to_string(), 3u32);
        cache.put("orphans:rpms:1", &value);

        let cached: Option<BTreeMap<String, u32>> = cache.get("orphans:rpms:1");
        assert_eq!(cached, Some(value));
    }

    #[test]
    fn test_miss_for_unknown_key() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(60));
        assert_eq!(cache.get::<u32>("nothing"), None);
    }

    #[test]
    fn test_stale_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600));
        cache.put("key", &42u32);

        let two_hours_ago = FileTime::from_system_time(
            SystemTime::now() - Duration::from_secs(2 * 3600),
        );
        filetime::set_file_mtime(cache.path_for("key"), two_hours_ago).unwrap();

        assert_eq!(cache.get::<u32>("key"), None);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(60));
        fs::write(cache.path_for("key"), b"{not json").unwrap();
        assert_eq!(cache.get::<u32>("key"), None);
    }

    #[test]
    fn test_disabled_cache_never_writes() {
        let cache = ResponseCache::disabled();
        cache.put("key", &1u32);
        assert!(!cache.is_enabled());
        assert_eq!(cache.get::<u32>("key"), None);
    }

    #[test]
    fn test_keys_map_to_distinct_files() {
        let cache = ResponseCache::new("/tmp/x", Duration::from_secs(1));
        assert_ne!(cache.path_for("a"), cache.path_for("b"));
        assert!(cache
            .path_for("a")
            .to_string_lossy()
            .ends_with(".json"));
    }
}
