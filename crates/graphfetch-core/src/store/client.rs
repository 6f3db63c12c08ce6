//! Timed, failure-absorbing access to a triple store

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{GraphRequest, TripleStore};
use crate::error::{Error, Result};
use crate::graph::Node;
use crate::stats::StatsCollector;

/// A store plus the stats of the fetch it serves.
///
/// Cheap to clone into concurrent batch workers.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn TripleStore>,
    stats: Arc<StatsCollector>,
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("http_requests", &self.stats.http_requests())
            .finish()
    }
}

impl StoreClient {
    pub fn new(store: Arc<dyn TripleStore>, stats: Arc<StatsCollector>) -> Self {
        Self { store, stats }
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    /// Run a request, recording its latency. Failures are returned.
    pub async fn try_fetch(&self, request: &GraphRequest) -> Result<Vec<Node>> {
        let start = Instant::now();
        let result = self.store.construct(request).await;
        let elapsed = start.elapsed();
        self.stats.record_request(elapsed);

        match &result {
            Ok(nodes) => debug!(
                subjects = request.subjects.len(),
                nodes = nodes.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Store request completed"
            ),
            Err(_) => self.stats.record_failure(),
        }
        result
    }

    /// Run a request; any failure is logged and yields no nodes
    pub async fn fetch(&self, request: &GraphRequest) -> Vec<Node> {
        match self.try_fetch(request).await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(
                    subjects = request.subjects.len(),
                    error = %e,
                    code = e.code(),
                    "Store request failed, continuing with partial data"
                );
                Vec::new()
            }
        }
    }

    /// Like `fetch`, but gives up after `limit`. A timed out request counts
    /// as a failed request and yields no nodes.
    pub async fn fetch_within(&self, request: &GraphRequest, limit: Duration) -> Vec<Node> {
        match tokio::time::timeout(limit, self.try_fetch(request)).await {
            Ok(Ok(nodes)) => nodes,
            Ok(Err(e)) => {
                warn!(
                    subjects = request.subjects.len(),
                    error = %e,
                    code = e.code(),
                    "Batch failed, continuing with partial data"
                );
                Vec::new()
            }
            Err(_) => {
                let e = Error::BatchTimeout(limit.as_secs());
                self.stats.record_request(limit);
                self.stats.record_failure();
                warn!(
                    subjects = request.subjects.len(),
                    error = %e,
                    code = e.code(),
                    "Batch timed out, continuing with partial data"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RequestKind;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl TripleStore for FailingStore {
        async fn construct(&self, _request: &GraphRequest) -> Result<Vec<Node>> {
            Err(Error::StoreError("HTTP 503".to_string()))
        }
    }

    struct OneNodeStore;

    #[async_trait]
    impl TripleStore for OneNodeStore {
        async fn construct(&self, request: &GraphRequest) -> Result<Vec<Node>> {
            Ok(request.subjects.iter().map(Node::new).collect())
        }
    }

    struct SlowStore;

    #[async_trait]
    impl TripleStore for SlowStore {
        async fn construct(&self, request: &GraphRequest) -> Result<Vec<Node>> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(request.subjects.iter().map(Node::new).collect())
        }
    }

    fn request() -> GraphRequest {
        GraphRequest::new(
            RequestKind::Level,
            vec!["https://data.odis.be/a/1".to_string()],
            "nl",
            String::new(),
        )
    }

    #[tokio::test]
    async fn test_failure_becomes_empty_result() {
        let stats = Arc::new(StatsCollector::new());
        let client = StoreClient::new(Arc::new(FailingStore), stats.clone());

        let nodes = client.fetch(&request()).await;

        assert!(nodes.is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.http_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_success_is_counted() {
        let stats = Arc::new(StatsCollector::new());
        let client = StoreClient::new(Arc::new(OneNodeStore), stats.clone());

        let nodes = client.fetch(&request()).await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(stats.snapshot().http_requests, 1);
        assert_eq!(stats.snapshot().failed_requests, 0);
    }

    #[tokio::test]
    async fn test_try_fetch_surfaces_error() {
        let client = StoreClient::new(Arc::new(FailingStore), Arc::new(StatsCollector::new()));
        let err = client.try_fetch(&request()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_within_times_out() {
        let stats = Arc::new(StatsCollector::new());
        let client = StoreClient::new(Arc::new(SlowStore), stats.clone());

        let nodes = client.fetch_within(&request(), Duration::from_secs(30)).await;

        assert!(nodes.is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.http_requests, 1);
        assert_eq!(snapshot.failed_requests, 1);
    }

    #[tokio::test]
    async fn test_fetch_within_passes_results_through() {
        let client = StoreClient::new(Arc::new(OneNodeStore), Arc::new(StatsCollector::new()));
        let nodes = client.fetch_within(&request(), Duration::from_secs(30)).await;
        assert_eq!(nodes.len(), 1);
    }
}
