//! Global breadth-first traversal across all roots
//!
//! One visited set, one frontier and one entity store cover every root. Each
//! round the frontier is split into batches, the batches are queried (one at
//! a time or on a bounded worker pool) and every batch finishes before the
//! results are merged and the next frontier is computed. Batch workers only
//! return nodes; all shared traversal state is written after the barrier.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{Traversal, guess_type};
use crate::config::{MAX_BATCH_SIZE, MAX_POOL_SIZE, TraversalConfig};
use crate::graph::{EntityStore, Node};
use crate::query::{QueryBuilder, Subject, clamp_depth};
use crate::store::{GraphRequest, RequestKind, StoreClient};

const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// How the batches of one round are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// One batch at a time
    Sequential { batch_timeout: Duration },
    /// Up to `pool_size` batches in flight; submission waits for a free slot
    Parallel {
        pool_size: usize,
        batch_timeout: Duration,
    },
}

impl Executor {
    pub fn sequential(config: &TraversalConfig) -> Self {
        Executor::Sequential {
            batch_timeout: config.batch_timeout(),
        }
    }

    pub fn parallel(config: &TraversalConfig) -> Self {
        Executor::Parallel {
            pool_size: config.effective_pool_size(),
            batch_timeout: config.batch_timeout(),
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Executor::Sequential {
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

/// Multi-root traversal driver
#[derive(Debug, Clone)]
pub struct Coordinator {
    client: StoreClient,
    queries: QueryBuilder,
    language: String,
    batch_size: usize,
    executor: Executor,
}

impl Coordinator {
    pub fn new(client: StoreClient, queries: QueryBuilder, language: impl Into<String>) -> Self {
        Self {
            client,
            queries,
            language: language.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            executor: Executor::default(),
        }
    }

    /// Subjects per store query, clamped to `1..=MAX_BATCH_SIZE`
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    /// Traverse from `roots`.
    ///
    /// A node at distance `d` from its nearest root is queried iff
    /// `d <= max_total_depth` and `d < max(per_entity_depth, 1)`. Every
    /// identifier is submitted to the store at most once.
    pub async fn run(
        &self,
        roots: &[String],
        entity_type: &str,
        per_entity_depth: usize,
        max_total_depth: usize,
    ) -> Traversal {
        let stats = self.client.stats();
        let namespace = self.queries.namespace();
        let expand_limit = clamp_depth(per_entity_depth).max(1);
        let expands = |distance: usize| distance <= max_total_depth && distance < expand_limit;

        let mut store = EntityStore::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut type_hints: BTreeMap<String, String> = BTreeMap::new();
        let mut frontier: Vec<Subject> = roots
            .iter()
            .map(|root| Subject::hinted(root.clone(), Some(entity_type.to_string())))
            .collect();
        for root in roots {
            type_hints.insert(root.clone(), entity_type.to_string());
        }
        stats.add_entities_queued(frontier.len());

        let mut distance = 0;
        while !frontier.is_empty() && expands(distance) {
            let subjects: Vec<Subject> = frontier
                .drain(..)
                .filter(|subject| visited.insert(subject.iri.clone()))
                .collect();
            if subjects.is_empty() {
                break;
            }
            stats.record_round();

            let requests: Vec<GraphRequest> = subjects
                .chunks(self.batch_size)
                .map(|batch| self.batch_request(batch))
                .collect();
            debug!(
                distance,
                subjects = subjects.len(),
                batches = requests.len(),
                "Starting traversal round"
            );

            // round barrier: every batch has finished here
            let results = self.execute(requests).await;

            let mut merged: Vec<String> = Vec::new();
            for node in results.into_iter().flatten() {
                let id = node.id().to_string();
                if store.merge(node) {
                    stats.add_nodes_fetched(1);
                }
                merged.push(id);
            }

            if expands(distance + 1) {
                let mut queued: HashSet<String> = HashSet::new();
                for id in &merged {
                    let Some(node) = store.get(id) else {
                        continue;
                    };
                    for (key, iri) in node.linked_iris(namespace) {
                        if visited.contains(iri) || !queued.insert(iri.to_string()) {
                            continue;
                        }
                        let hint = guess_type(namespace, key, iri);
                        if let Some(hint) = &hint {
                            type_hints
                                .entry(iri.to_string())
                                .or_insert_with(|| hint.clone());
                        }
                        frontier.push(Subject::hinted(iri, hint));
                    }
                }
                stats.add_entities_queued(frontier.len());
            }
            distance += 1;
        }

        Traversal { store, type_hints }
    }

    fn batch_request(&self, batch: &[Subject]) -> GraphRequest {
        GraphRequest::new(
            RequestKind::Batch,
            batch.iter().map(|s| s.iri.clone()).collect(),
            &self.language,
            self.queries.batch(batch, &self.language),
        )
    }

    /// Run one round's requests. Results keep submission order; a failed or
    /// timed out batch contributes an empty list.
    async fn execute(&self, requests: Vec<GraphRequest>) -> Vec<Vec<Node>> {
        match self.executor {
            Executor::Sequential { batch_timeout } => {
                stream::iter(&requests)
                    .then(|request| self.client.fetch_within(request, batch_timeout))
                    .collect()
                    .await
            }
            Executor::Parallel {
                pool_size,
                batch_timeout,
            } => {
                self.execute_parallel(requests, pool_size.clamp(1, MAX_POOL_SIZE), batch_timeout)
                    .await
            }
        }
    }

    async fn execute_parallel(
        &self,
        requests: Vec<GraphRequest>,
        pool_size: usize,
        batch_timeout: Duration,
    ) -> Vec<Vec<Node>> {
        let semaphore = Arc::new(Semaphore::new(pool_size));
        let mut results: Vec<Vec<Node>> = vec![Vec::new(); requests.len()];
        let mut workers = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            // waits for a free worker slot instead of dropping the batch
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    results[index] = self.client.fetch_within(&request, batch_timeout).await;
                    continue;
                }
            };

            let client = self.client.clone();
            workers.spawn(async move {
                let _permit = permit;
                (index, client.fetch_within(&request, batch_timeout).await)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((index, nodes)) => results[index] = nodes,
                Err(e) => warn!(error = %e, "Batch worker aborted, continuing with partial data"),
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Namespace, Value};
    use crate::stats::StatsCollector;
    use crate::store::MemoryStore;
    use std::collections::BTreeMap;

    const NS: &str = "https://data.odis.be/";

    fn iri(path: &str) -> String {
        format!("{}{}", NS, path)
    }

    fn ns() -> Namespace {
        let mut collections = BTreeMap::new();
        collections.insert("Persoon".to_string(), "personen".to_string());
        Namespace::new("odis", NS).with_collections(collections)
    }

    fn node(path: &str, links: &[(&str, &str)]) -> Node {
        let mut node = Node::new(iri(path));
        node.set(iri("label"), Value::text(path));
        for (key, target) in links {
            node.set(iri(key), Value::reference(iri(target)));
        }
        node
    }

    fn build_coordinator(store: &MemoryStore, executor: Executor) -> (Coordinator, Arc<StatsCollector>) {
        let stats = Arc::new(StatsCollector::new());
        let client = StoreClient::new(Arc::new(store.clone()), stats.clone());
        let coordinator = Coordinator::new(client, QueryBuilder::new(ns()), "nl")
            .batch_size(2)
            .executor(executor);
        (coordinator, stats)
    }

    fn parallel() -> Executor {
        Executor::Parallel {
            pool_size: 2,
            batch_timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_shared_neighbors_are_fetched_once() {
        let store = MemoryStore::new(ns()).with_nodes([
            node("archieven/A1", &[("creator", "personen/P1")]),
            node("archieven/A2", &[("creator", "personen/P1")]),
            node("personen/P1", &[("archief", "archieven/A1")]),
        ]);
        let (coordinator, stats) = build_coordinator(&store, parallel());

        let traversal = coordinator
            .run(&[iri("archieven/A1"), iri("archieven/A2")], "odis:Archief", 5, 10)
            .await;

        assert_eq!(traversal.store.len(), 3);
        let mut subjects = store.requested_subjects();
        let total = subjects.len();
        subjects.sort();
        subjects.dedup();
        assert_eq!(subjects.len(), total);
        assert_eq!(stats.snapshot().rounds, 2);
    }

    #[tokio::test]
    async fn test_depth_limits_expansion() {
        let store = MemoryStore::new(ns()).with_nodes([
            node("archieven/A1", &[("creator", "personen/P1")]),
            node("personen/P1", &[("knows", "personen/P2")]),
            node("personen/P2", &[("knows", "personen/P3")]),
            node("personen/P3", &[]),
        ]);
        let (coordinator, _) = build_coordinator(&store, Executor::default());

        let traversal = coordinator
            .run(&[iri("archieven/A1")], "odis:Archief", 2, 10)
            .await;
        assert!(traversal.store.contains(&iri("personen/P1")));
        assert!(!traversal.store.contains(&iri("personen/P2")));

        let (coordinator, _) = build_coordinator(&store, Executor::default());
        let traversal = coordinator
            .run(&[iri("archieven/A1")], "odis:Archief", 5, 1)
            .await;
        assert_eq!(traversal.store.len(), 2);
    }

    #[tokio::test]
    async fn test_frontier_is_batched() {
        let store = MemoryStore::new(ns()).with_nodes([
            node("a/1", &[]),
            node("a/2", &[]),
            node("a/3", &[]),
            node("a/4", &[]),
            node("a/5", &[]),
        ]);
        let (coordinator, _) = build_coordinator(&store, parallel());
        let roots: Vec<String> = (1..=5).map(|i| iri(&format!("a/{}", i))).collect();

        let traversal = coordinator.run(&roots, "odis:Archief", 1, 10).await;

        assert_eq!(traversal.store.len(), 5);
        let mut sizes: Vec<usize> = store.requests().iter().map(|r| r.subjects.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![1, 2, 2]);
        assert!(store.requests().iter().all(|r| r.kind == RequestKind::Batch));
    }

    #[tokio::test]
    async fn test_discovered_nodes_get_type_hints() {
        let store = MemoryStore::new(ns()).with_nodes([
            node("archieven/A1", &[("creator", "personen/P1")]),
            node("personen/P1", &[]),
        ]);
        let (coordinator, _) = build_coordinator(&store, Executor::default());

        let traversal = coordinator
            .run(&[iri("archieven/A1")], "odis:Archief", 2, 10)
            .await;

        assert_eq!(
            traversal.type_hints.get(&iri("archieven/A1")).map(String::as_str),
            Some("odis:Archief")
        );
        assert_eq!(
            traversal.type_hints.get(&iri("personen/P1")).map(String::as_str),
            Some("odis:Persoon")
        );
        assert!(store.requests()[1].query.contains("expected odis:Persoon"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_batch_is_isolated() {
        let store = MemoryStore::new(ns()).with_nodes([
            node("a/1", &[]),
            node("a/2", &[]),
            node("a/3", &[]),
            node("a/4", &[]),
            node("a/5", &[]),
            node("a/6", &[]),
        ]);
        store.delay_on(iri("a/3"), Duration::from_secs(120));
        let (coordinator, stats) = build_coordinator(&store, parallel());
        let roots: Vec<String> = (1..=6).map(|i| iri(&format!("a/{}", i))).collect();

        let traversal = coordinator.run(&roots, "odis:Archief", 1, 10).await;

        assert_eq!(traversal.store.len(), 4);
        assert!(!traversal.store.contains(&iri("a/3")));
        assert!(!traversal.store.contains(&iri("a/4")));
        assert_eq!(stats.snapshot().failed_requests, 1);
    }
}
