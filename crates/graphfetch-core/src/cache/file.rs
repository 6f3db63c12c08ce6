//! File-backed result cache, one JSON file per key

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::CacheStore;
use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    expires_at: DateTime<Utc>,
    value: JsonValue,
}

/// Cache that persists entries under a directory
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_failure("create cache directory", &dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::CacheError(format!("Invalid cache key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    fn read_entry(&self, path: &Path) -> Result<Option<StoredEntry>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).map_err(|e| io_failure("read cache entry", path, e))?;
        match serde_json::from_str::<StoredEntry>(&contents) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Discarding unreadable cache entry");
                let _ = fs::remove_file(path);
                Ok(None)
            }
        }
    }
}

impl CacheStore for FileCache {
    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let path = self.entry_path(key)?;
        let Some(entry) = self.read_entry(&path)? else {
            return Ok(None);
        };

        if entry.expires_at <= Utc::now() {
            debug!(key = %key, "Cache entry expired");
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn put(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()> {
        let path = self.entry_path(key)?;
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| Error::CacheError(format!("Invalid TTL: {}", e)))?;

        let entry = StoredEntry {
            expires_at: Utc::now() + ttl,
            value: value.clone(),
        };

        // Write then rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&entry)?)
            .map_err(|e| io_failure("write cache entry", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| io_failure("store cache entry", &path, e))?;
        Ok(())
    }
}

fn io_failure(action: &str, path: &Path, error: std::io::Error) -> Error {
    Error::CacheError(format!("Failed to {} {}: {}", action, path.display(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();

        cache.put("abc123", &json!([{"id": "A1"}]), Duration::from_secs(60)).unwrap();

        assert!(cache.has("abc123").unwrap());
        assert_eq!(cache.get("abc123").unwrap(), Some(json!([{"id": "A1"}])));
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        FileCache::open(dir.path())
            .unwrap()
            .put("k1", &json!("v"), Duration::from_secs(60))
            .unwrap();

        let reopened = FileCache::open(dir.path()).unwrap();
        assert_eq!(reopened.get("k1").unwrap(), Some(json!("v")));
    }

    #[test]
    fn test_expired_entry_removed() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        cache.put("old", &json!(1), Duration::ZERO).unwrap();

        assert_eq!(cache.get("old").unwrap(), None);
        assert!(!dir.path().join("old.json").exists());
    }

    #[test]
    fn test_corrupt_entry_is_absent() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), "not json").unwrap();

        assert!(!cache.has("bad").unwrap());
    }

    #[test]
    fn test_unreadable_entry_is_a_cache_error() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        fs::create_dir(dir.path().join("k1.json")).unwrap();

        let err = cache.get("k1").unwrap_err();
        assert!(matches!(err, Error::CacheError(_)));
        assert_eq!(err.code(), "E400");
    }

    #[test]
    fn test_failed_write_is_a_cache_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("cache");
        let cache = FileCache::open(&root).unwrap();
        fs::remove_dir(&root).unwrap();
        fs::write(&root, "not a directory").unwrap();

        let err = cache
            .put("k1", &json!("v"), Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(err.code(), "E400");
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        let err = cache.get("../etc/passwd").unwrap_err();
        assert_eq!(err.code(), "E400");
    }
}
