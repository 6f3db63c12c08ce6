//! Traversal cost accounting
//!
//! A [`StatsCollector`] lives for exactly one top-level fetch. Concurrent
//! batch workers share it through an `Arc` and only ever increment it;
//! callers read a [`Stats`] snapshot once the fetch returns.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Counters for a single fetch
#[derive(Debug, Default)]
pub struct StatsCollector {
    http_requests: AtomicU64,
    http_time_us: AtomicU64,
    failed_requests: AtomicU64,
    nodes_fetched: AtomicU64,
    nodes_embedded: AtomicU64,
    entities_queued: AtomicU64,
    cache_hits: AtomicU64,
    rounds: AtomicU64,
    from_cache: AtomicBool,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one store request and how long it took
    pub fn record_request(&self, elapsed: Duration) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        self.http_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_nodes_fetched(&self, count: usize) {
        self.nodes_fetched.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_embedded(&self) {
        self.nodes_embedded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_entities_queued(&self, count: usize) {
        self.entities_queued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_round(&self) {
        self.rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark that the whole result was served from the result cache
    pub fn mark_from_cache(&self) {
        self.from_cache.store(true, Ordering::Relaxed);
    }

    pub fn http_requests(&self) -> u64 {
        self.http_requests.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Take a consistent-enough snapshot of all counters
    pub fn snapshot(&self) -> Stats {
        let http_requests = self.http_requests.load(Ordering::Relaxed);
        let http_time_ms = self.http_time_us.load(Ordering::Relaxed) as f64 / 1000.0;
        let avg_request_ms = if http_requests > 0 {
            ((http_time_ms / http_requests as f64) * 100.0).round() / 100.0
        } else {
            0.0
        };

        Stats {
            http_requests,
            http_time_ms,
            avg_request_ms,
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            nodes_fetched: self.nodes_fetched.load(Ordering::Relaxed),
            nodes_embedded: self.nodes_embedded.load(Ordering::Relaxed),
            entities_queued: self.entities_queued.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            rounds: self.rounds.load(Ordering::Relaxed),
            from_cache: self.from_cache.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of a finished fetch's counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub http_requests: u64,
    pub http_time_ms: f64,
    pub avg_request_ms: f64,
    pub failed_requests: u64,
    pub nodes_fetched: u64,
    pub nodes_embedded: u64,
    pub entities_queued: u64,
    /// Embedder reuses of an already materialized node
    pub cache_hits: u64,
    pub rounds: u64,
    /// Whether the result came from the result cache
    pub from_cache: bool,
}
