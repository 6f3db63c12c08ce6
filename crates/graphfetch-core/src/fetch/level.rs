//! Level-wise fetching
//!
//! Each root is expanded on its own, one query per hop, for as many rounds
//! as both depth limits allow.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::{Traversal, guess_type};
use crate::config::MAX_BATCH_SIZE;
use crate::graph::{EntityStore, Node};
use crate::query::{QueryBuilder, clamp_depth};
use crate::store::{GraphRequest, RequestKind, StoreClient};

/// Per-entity breadth-first fetcher
#[derive(Debug, Clone)]
pub struct LevelFetcher {
    client: StoreClient,
    queries: QueryBuilder,
    language: String,
}

impl LevelFetcher {
    pub fn new(client: StoreClient, queries: QueryBuilder, language: impl Into<String>) -> Self {
        Self {
            client,
            queries,
            language: language.into(),
        }
    }

    /// Expand one entity. The first round is restricted to `entity_type`
    /// when one is known; later rounds follow any in-namespace predicate.
    ///
    /// Depth 0 behaves like depth 1: the entity's own properties are always
    /// fetched.
    pub async fn fetch_entity(
        &self,
        root: &str,
        entity_type: Option<&str>,
        depth: usize,
    ) -> EntityStore {
        let rounds = clamp_depth(depth).max(1);
        let namespace = self.queries.namespace();
        let mut collected: HashSet<String> = HashSet::from([root.to_string()]);
        let mut frontier = vec![root.to_string()];
        let mut nodes = EntityStore::new();

        for round in 0..rounds {
            if frontier.is_empty() {
                break;
            }
            self.client.stats().record_round();

            let scoped = if round == 0 { entity_type } else { None };
            let fetched = self.query_level(&frontier, scoped).await;
            if fetched.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for node in &fetched {
                for (_, iri) in node.linked_iris(namespace) {
                    if collected.insert(iri.to_string()) {
                        next.push(iri.to_string());
                    }
                }
            }
            for node in fetched {
                nodes.merge(node);
            }
            frontier = next;
        }

        nodes
    }

    /// Expand every root on its own.
    ///
    /// A root gets `max(per_entity_depth, 1)` rounds, capped at
    /// `max_total_depth + 1`, so a node at distance `d` from a root is
    /// queried iff `d <= max_total_depth` and `d < max(per_entity_depth, 1)`.
    /// Identifiers past that edge stay unfetched. Roots do not share their
    /// seen sets, so a node close to two roots is fetched for each.
    pub async fn fetch_all(
        &self,
        roots: &[String],
        entity_type: &str,
        per_entity_depth: usize,
        max_total_depth: usize,
    ) -> Traversal {
        let stats = self.client.stats();
        let namespace = self.queries.namespace();
        let rounds = clamp_depth(per_entity_depth)
            .max(1)
            .min(max_total_depth.saturating_add(1));

        let mut type_hints: BTreeMap<String, String> = roots
            .iter()
            .map(|root| (root.clone(), entity_type.to_string()))
            .collect();
        stats.add_entities_queued(roots.len());

        let mut all = EntityStore::new();

        for root in roots {
            let local = self.fetch_entity(root, Some(entity_type), rounds).await;
            debug!(entity = %root, rounds, nodes = local.len(), "Entity expanded");

            for node in local.nodes() {
                for (key, iri) in node.linked_iris(namespace) {
                    if type_hints.contains_key(iri) {
                        continue;
                    }
                    if let Some(hint) = guess_type(namespace, key, iri) {
                        type_hints.insert(iri.to_string(), hint);
                    }
                }
            }

            let added = all.absorb(local);
            stats.add_nodes_fetched(added);
        }

        Traversal {
            store: all,
            type_hints,
        }
    }

    /// One round of queries, split into chunks the store accepts
    async fn query_level(&self, subjects: &[String], entity_type: Option<&str>) -> Vec<Node> {
        let mut nodes = Vec::new();
        for chunk in subjects.chunks(MAX_BATCH_SIZE) {
            let request = match entity_type {
                Some(entity_type) => GraphRequest::new(
                    RequestKind::Root {
                        entity_type: entity_type.to_string(),
                    },
                    chunk.to_vec(),
                    &self.language,
                    self.queries.root_level(chunk, entity_type, &self.language),
                ),
                None => GraphRequest::new(
                    RequestKind::Level,
                    chunk.to_vec(),
                    &self.language,
                    self.queries.level(chunk, &self.language),
                ),
            };
            nodes.extend(self.client.fetch(&request).await);
        }
        nodes
    }
}
