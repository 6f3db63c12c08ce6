//! Graph fetching
//!
//! This module provides:
//! - `GraphFetcher`, the `fetch_graph` entry point: input validation, result
//!   cache, traversal, materialization and stats for one call
//! - The level-wise fetcher (one bounded expansion per root)
//! - The multi-root coordinator (global BFS, sequential or bounded-parallel)
//!
//! All traversal state lives for exactly one call; only the result cache
//! outlives it.

mod coordinator;
mod level;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, FileCache, cache_key};
use crate::config::{Config, Strategy};
use crate::embed::{Embedder, FULL_ID_KEY};
use crate::error::{Error, Result};
use crate::graph::{EntityStore, Namespace};
use crate::ids::{normalize_ids, validate_entity_type};
use crate::query::{QueryBuilder, clamp_depth};
use crate::stats::{Stats, StatsCollector};
use crate::store::{GraphRequest, HttpStore, RequestKind, StoreClient, TripleStore};

pub use coordinator::{Coordinator, Executor};
pub use level::LevelFetcher;

/// What a traversal collected
#[derive(Debug, Default)]
pub struct Traversal {
    pub store: EntityStore,
    /// Identifier → best-effort type, for roots and discovered nodes
    pub type_hints: BTreeMap<String, String>,
}

/// Best-effort type of `iri`, reached through `predicate`.
///
/// The IRI's collection segment wins over the predicate name. Hints only
/// decorate queries; they never filter.
pub fn guess_type(namespace: &Namespace, predicate: &str, iri: &str) -> Option<String> {
    namespace
        .type_for_iri(iri)
        .or_else(|| namespace.type_for_property(predicate))
}

/// Parameters of one fetch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Full IRIs, short ids or comma-separated lists of either
    pub ids: Vec<String>,
    pub entity_type: String,
    pub depth: usize,
    pub max_total_depth: usize,
    pub language: String,
    pub bypass_cache: bool,
    pub strategy: Strategy,
}

impl FetchOptions {
    /// Options with every tunable taken from `config`
    pub fn from_config(
        config: &Config,
        ids: impl IntoIterator<Item = impl Into<String>>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            entity_type: entity_type.into(),
            depth: config.traversal.per_entity_depth,
            max_total_depth: config.traversal.max_total_depth,
            language: config.graph.language.clone(),
            bypass_cache: false,
            strategy: config.traversal.strategy,
        }
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn max_total_depth(mut self, max_total_depth: usize) -> Self {
        self.max_total_depth = max_total_depth;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Result cache key for these options over the normalized `roots`
    pub fn cache_key(&self, roots: &[String]) -> String {
        cache_key(
            &self.entity_type,
            roots,
            clamp_depth(self.depth),
            self.max_total_depth,
            &self.language,
            self.strategy,
        )
    }
}

/// Result of one fetch call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchOutcome {
    /// Normalized root identifiers, in request order
    pub roots: Vec<String>,
    /// One materialized document per root that was found
    pub documents: Vec<JsonValue>,
    /// Roots the store had nothing for
    pub missing: Vec<String>,
    pub type_hints: BTreeMap<String, String>,
    pub stats: Stats,
}

impl FetchOutcome {
    /// A single document for a single root (`null` when not found), an
    /// array of documents otherwise
    pub fn into_document(self) -> JsonValue {
        if self.roots.len() == 1 {
            self.documents.into_iter().next().unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Array(self.documents)
        }
    }
}

/// The part of an outcome stored in the result cache
#[derive(Debug, Serialize, Deserialize)]
struct CachedResult {
    documents: Vec<JsonValue>,
    missing: Vec<String>,
    #[serde(default)]
    type_hints: BTreeMap<String, String>,
}

/// Fetches, merges and materializes subgraphs of one triple store
pub struct GraphFetcher {
    store: Arc<dyn TripleStore>,
    config: Config,
    namespace: Namespace,
    cache: Option<Arc<dyn CacheStore>>,
    last_stats: RwLock<Stats>,
}

impl std::fmt::Debug for GraphFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphFetcher")
            .field("namespace", &self.namespace.iri())
            .field("strategy", &self.config.traversal.strategy)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl GraphFetcher {
    /// A fetcher over `store` without a result cache
    pub fn new(store: Arc<dyn TripleStore>, config: Config) -> Self {
        let namespace = config.graph.namespace();
        Self {
            store,
            config,
            namespace,
            cache: None,
            last_stats: RwLock::new(Stats::default()),
        }
    }

    /// HTTP store plus, when enabled, a file cache under the configured
    /// directory (default: `<config dir>/cache`)
    pub fn from_config(config: Config) -> Result<Self> {
        let store = HttpStore::from_config(&config)?;
        let cache = if config.cache.enabled {
            let dir = config
                .cache
                .resolved_dir()
                .map_err(|e| Error::ConfigError(e.to_string()))?;
            Some(Arc::new(FileCache::open(dir)?) as Arc<dyn CacheStore>)
        } else {
            None
        };

        let fetcher = Self::new(Arc::new(store), config);
        Ok(match cache {
            Some(cache) => fetcher.with_cache(cache),
            None => fetcher,
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Options prefilled from this fetcher's configuration
    pub fn options(
        &self,
        ids: impl IntoIterator<Item = impl Into<String>>,
        entity_type: impl Into<String>,
    ) -> FetchOptions {
        FetchOptions::from_config(&self.config, ids, entity_type)
    }

    /// Stats of the most recent completed fetch
    pub fn last_stats(&self) -> Stats {
        self.last_stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// `fetch` shaped as the call surface: one document for one id, an array
    /// for several
    pub async fn fetch_graph(
        &self,
        ids: &[String],
        entity_type: &str,
        depth: usize,
        language: &str,
        bypass_cache: bool,
    ) -> Result<JsonValue> {
        let options = self
            .options(ids.iter().cloned(), entity_type)
            .depth(depth)
            .language(language)
            .bypass_cache(bypass_cache);
        Ok(self.fetch(&options).await?.into_document())
    }

    /// Fetch and materialize the subgraphs around `options.ids`.
    ///
    /// Invalid input and cache failures are errors; store failures only make
    /// the result smaller.
    pub async fn fetch(&self, options: &FetchOptions) -> Result<FetchOutcome> {
        validate_entity_type(&options.entity_type)?;
        let roots = normalize_ids(&options.ids, &options.entity_type, &self.namespace)?;
        let depth = clamp_depth(options.depth);
        let stats = Arc::new(StatsCollector::new());
        let key = options.cache_key(&roots);

        if !options.bypass_cache
            && let Some(mut cached) = self.read_cache(&key)?
        {
            // the entry may have been written for the same ids in another order
            cached.documents.sort_by_key(|document| {
                let id = document.get(FULL_ID_KEY).and_then(JsonValue::as_str);
                roots.iter().position(|root| Some(root.as_str()) == id)
            });
            stats.mark_from_cache();
            debug!(key = %key, roots = roots.len(), "Serving fetch from result cache");
            return Ok(self.finish(roots, cached, &stats));
        }

        let traversal = self.traverse(&roots, options, depth, stats.clone()).await;

        let embedder = Embedder::new(&traversal.store, &self.namespace, &stats);
        let mut documents = Vec::with_capacity(roots.len());
        let mut missing = Vec::new();
        for (root, document) in embedder.embed_all(&roots) {
            match document {
                Some(document) => documents.push(document),
                None => missing.push(root),
            }
        }

        let result = CachedResult {
            documents,
            missing,
            type_hints: traversal.type_hints,
        };
        if !result.documents.is_empty() {
            self.write_cache(&key, &result)?;
        }

        let outcome = self.finish(roots, result, &stats);
        info!(
            roots = outcome.roots.len(),
            documents = outcome.documents.len(),
            strategy = %options.strategy,
            requests = outcome.stats.http_requests,
            nodes = outcome.stats.nodes_fetched,
            "Fetch completed"
        );
        Ok(outcome)
    }

    async fn traverse(
        &self,
        roots: &[String],
        options: &FetchOptions,
        depth: usize,
        stats: Arc<StatsCollector>,
    ) -> Traversal {
        let client = StoreClient::new(self.store.clone(), stats);
        let queries = QueryBuilder::new(self.namespace.clone());
        let traversal = &self.config.traversal;
        let language = options.language.as_str();

        match options.strategy {
            Strategy::Level => {
                LevelFetcher::new(client, queries, language)
                    .fetch_all(roots, &options.entity_type, depth, options.max_total_depth)
                    .await
            }
            Strategy::Sequential | Strategy::Parallel => {
                let executor = if options.strategy == Strategy::Parallel {
                    Executor::parallel(traversal)
                } else {
                    Executor::sequential(traversal)
                };
                Coordinator::new(client, queries, language)
                    .batch_size(traversal.effective_batch_size())
                    .executor(executor)
                    .run(roots, &options.entity_type, depth, options.max_total_depth)
                    .await
            }
            Strategy::Construct => {
                construct_neighborhood(&client, &queries, roots, &options.entity_type, depth, language)
                    .await
            }
        }
    }

    fn read_cache(&self, key: &str) -> Result<Option<CachedResult>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if !cache.has(key)? {
            return Ok(None);
        }
        let Some(value) = cache.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable cache entry");
                Ok(None)
            }
        }
    }

    fn write_cache(&self, key: &str, result: &CachedResult) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        let value = serde_json::to_value(result)?;
        cache.put(key, &value, self.config.cache.ttl())
    }

    fn finish(&self, roots: Vec<String>, result: CachedResult, stats: &StatsCollector) -> FetchOutcome {
        let snapshot = stats.snapshot();
        if let Ok(mut last) = self.last_stats.write() {
            *last = snapshot.clone();
        }
        FetchOutcome {
            roots,
            documents: result.documents,
            missing: result.missing,
            type_hints: result.type_hints,
            stats: snapshot,
        }
    }
}

/// The whole neighborhood in one request
async fn construct_neighborhood(
    client: &StoreClient,
    queries: &QueryBuilder,
    roots: &[String],
    entity_type: &str,
    depth: usize,
    language: &str,
) -> Traversal {
    let stats = client.stats();
    stats.add_entities_queued(roots.len());
    stats.record_round();

    let request = GraphRequest::new(
        RequestKind::Neighborhood {
            entity_type: entity_type.to_string(),
            depth,
        },
        roots.to_vec(),
        language,
        queries.neighborhood(roots, entity_type, depth, language),
    );

    let mut store = EntityStore::new();
    for node in client.fetch(&request).await {
        if store.merge(node) {
            stats.add_nodes_fetched(1);
        }
    }

    Traversal {
        store,
        type_hints: roots
            .iter()
            .map(|root| (root.clone(), entity_type.to_string()))
            .collect(),
    }
}
