//! In-memory triple store
//!
//! Evaluates `GraphRequest`s directly against a node table with the same
//! namespace, type and language rules the generated SPARQL applies. Used for
//! offline fixtures and as the synthetic store in tests, where it can also
//! record requests and inject latency or failures per subject.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::parse::parse_graph;
use super::{GraphRequest, RequestKind, TripleStore};
use crate::error::{Error, Result};
use crate::graph::{Namespace, Node, TYPE_KEY, Value};
use crate::query::clamp_depth;

#[derive(Debug, Default)]
struct Faults {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// Node table answering graph requests without a network
#[derive(Debug, Clone)]
pub struct MemoryStore {
    namespace: Namespace,
    nodes: Arc<HashMap<String, Node>>,
    faults: Arc<Mutex<Faults>>,
    log: Arc<Mutex<Vec<GraphRequest>>>,
}

impl MemoryStore {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            nodes: Arc::new(HashMap::new()),
            faults: Arc::new(Mutex::new(Faults::default())),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Load a JSON-LD document (`@graph`, array or single node)
    pub fn from_json_ld(body: &str, namespace: Namespace) -> Result<Self> {
        let nodes = parse_graph(body, &namespace)?;
        Ok(Self::new(namespace).with_nodes(nodes))
    }

    /// Load a JSON-LD value
    pub fn from_json_value(document: &JsonValue, namespace: Namespace) -> Result<Self> {
        Self::from_json_ld(&serde_json::to_string(document)?, namespace)
    }

    /// Add nodes, merging observations of the same identifier
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        let table = Arc::make_mut(&mut self.nodes);
        for node in nodes {
            match table.get_mut(node.id()) {
                Some(existing) => existing.merge(node),
                None => {
                    table.insert(node.id().to_string(), node);
                }
            }
        }
        self
    }

    pub fn with_node(self, node: Node) -> Self {
        self.with_nodes([node])
    }

    /// Fail every request that includes `iri`
    pub fn fail_on(&self, iri: impl Into<String>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing.insert(iri.into());
        }
    }

    /// Delay every request that includes `iri`
    pub fn delay_on(&self, iri: impl Into<String>, delay: Duration) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.delays.insert(iri.into(), delay);
        }
    }

    /// All requests received so far, in arrival order
    pub fn requests(&self) -> Vec<GraphRequest> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().map(|log| log.len()).unwrap_or(0)
    }

    /// Every subject submitted, one entry per submission
    pub fn requested_subjects(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .flat_map(|request| request.subjects)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Project a stored node through the predicate and language filters
    fn project(&self, id: &str, language: &str, keep_type: bool) -> Option<Node> {
        let stored = self.nodes.get(id)?;
        let mut projected = Node::new(id);

        for (key, value) in stored.properties() {
            let allowed = if key == TYPE_KEY {
                keep_type
            } else {
                self.namespace.contains(key)
            };
            if !allowed {
                continue;
            }
            let items: Vec<Value> = value
                .items()
                .iter()
                .filter(|item| matches_language(item, language))
                .cloned()
                .collect();
            if let Some(value) = Value::from_items(items) {
                projected.set(key, value);
            }
        }

        (!projected.is_empty()).then_some(projected)
    }

    fn has_type(&self, id: &str, type_iri: &str) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.types().any(|t| t == type_iri))
    }

    fn evaluate(&self, request: &GraphRequest) -> Vec<Node> {
        let language = request.language.as_str();
        match &request.kind {
            RequestKind::Root { entity_type } => {
                let type_iri = self.namespace.expand(entity_type);
                request
                    .subjects
                    .iter()
                    .filter(|id| self.has_type(id, &type_iri))
                    .filter_map(|id| {
                        let mut node = self.project(id, language, false)?;
                        node.set(TYPE_KEY, Value::Reference(type_iri.clone()));
                        Some(node)
                    })
                    .collect()
            }
            RequestKind::Level => request
                .subjects
                .iter()
                .filter_map(|id| self.project(id, language, false))
                .collect(),
            RequestKind::Batch => request
                .subjects
                .iter()
                .filter_map(|id| self.project(id, language, true))
                .collect(),
            RequestKind::Neighborhood { entity_type, depth } => {
                self.neighborhood(&request.subjects, entity_type, *depth, language)
            }
        }
    }

    fn neighborhood(
        &self,
        subjects: &[String],
        entity_type: &str,
        depth: usize,
        language: &str,
    ) -> Vec<Node> {
        let type_iri = self.namespace.expand(entity_type);
        let mut frontier: Vec<String> = subjects
            .iter()
            .filter(|id| self.has_type(id, &type_iri))
            .cloned()
            .collect();
        let mut seen: HashSet<String> = frontier.iter().cloned().collect();
        let mut out = Vec::new();

        for level in 0..clamp_depth(depth).max(1) {
            let mut next = Vec::new();
            for id in &frontier {
                let Some(mut node) = self.project(id, language, false) else {
                    continue;
                };
                for (_, value) in node.properties() {
                    for iri in value.references() {
                        if seen.insert(iri.to_string()) {
                            next.push(iri.to_string());
                        }
                    }
                }
                if level == 0 {
                    node.set(TYPE_KEY, Value::Reference(type_iri.clone()));
                }
                out.push(node);
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        out
    }
}

fn matches_language(value: &Value, language: &str) -> bool {
    match value {
        Value::Scalar(literal) => literal
            .language
            .as_deref()
            .is_none_or(|tag| tag.is_empty() || tag == language),
        _ => true,
    }
}

#[async_trait]
impl TripleStore for MemoryStore {
    async fn construct(&self, request: &GraphRequest) -> Result<Vec<Node>> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }

        let (fails, delay) = {
            let faults = self
                .faults
                .lock()
                .map_err(|_| Error::StoreError("fault table lock poisoned".to_string()))?;
            let fails = request.subjects.iter().any(|s| faults.failing.contains(s));
            let delay = request
                .subjects
                .iter()
                .filter_map(|s| faults.delays.get(s).copied())
                .max();
            (fails, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(Error::StoreError(format!(
                "injected failure for {} subjects",
                request.subjects.len()
            )));
        }

        Ok(self.evaluate(request))
    }
}
