//! Result cache
//!
//! This module provides:
//! - The `CacheStore` contract the fetcher relies on (`has`/`get`/`put` with a TTL)
//! - An in-memory store for single-process use and tests
//! - A file-backed store that survives restarts
//! - Deterministic cache keys for a fetch request

mod file;
mod memory;

use std::time::Duration;

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::config::Strategy;
use crate::error::Result;

pub use file::FileCache;
pub use memory::MemoryCache;

/// Key/value store for materialized fetch results.
///
/// Expired entries must behave as absent. Errors are hard failures for the
/// fetch that hit them.
pub trait CacheStore: Send + Sync {
    fn has(&self, key: &str) -> Result<bool>;

    fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    fn put(&self, key: &str, value: &JsonValue, ttl: Duration) -> Result<()>;
}

/// Cache key for a fetch: SHA-256 over every input that shapes the result.
///
/// Ids are sorted and deduplicated first, so the order of the request does
/// not matter.
pub fn cache_key(
    entity_type: &str,
    ids: &[String],
    depth: usize,
    max_total_depth: usize,
    language: &str,
    strategy: Strategy,
) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let parts: [&str; 6] = [
        entity_type,
        &sorted.join(","),
        &depth.to_string(),
        &max_total_depth.to_string(),
        language,
        strategy.as_str(),
    ];

    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
