//! In-memory result cache

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;

use super::CacheStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: JsonValue,
    expires_at: Instant,
}

/// Process-local cache, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl CacheStore for MemoryCache {
    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::CacheError("memory cache lock poisoned".to_string()))?;

        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::CacheError("memory cache lock poisoned".to_string()))?;

        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_and_get() {
        let cache = MemoryCache::new();
        assert!(!cache.has("k").unwrap());

        cache.put("k", &json!({"id": "A1"}), Duration::from_secs(60)).unwrap();

        assert!(cache.has("k").unwrap());
        assert_eq!(cache.get("k").unwrap(), Some(json!({"id": "A1"})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let cache = MemoryCache::new();
        cache.put("k", &json!(1), Duration::ZERO).unwrap();
        assert!(!cache.has("k").unwrap());
        assert_eq!(cache.get("k").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = MemoryCache::new();
        let other = cache.clone();
        cache.put("k", &json!(1), Duration::from_secs(60)).unwrap();
        assert!(other.has("k").unwrap());

        other.clear();
        assert!(!cache.has("k").unwrap());
    }
}
