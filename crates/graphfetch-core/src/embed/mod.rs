//! Cycle-safe materialization of nested documents
//!
//! Walks the entity store from a root and inlines every reference. A node
//! already on the active recursion path, or one that was never fetched,
//! materializes to a stub `{"_id": <iri>, "id": <local id>}`. Finished
//! documents are memoized so shared sub-trees are built once per fetch.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value as JsonValue};

use crate::graph::{EntityStore, Namespace, Node, Value, local_id};
use crate::stats::StatsCollector;

/// Key holding the full identifier in output documents
pub const FULL_ID_KEY: &str = "_id";

/// Key holding the short identifier in output documents
pub const SHORT_ID_KEY: &str = "id";

/// Recursion bookkeeping, threaded explicitly through every call
#[derive(Debug, Default)]
pub struct EmbedState {
    in_progress: HashSet<String>,
    completed: HashMap<String, JsonValue>,
}

impl EmbedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fully materialized nodes
    pub fn completed(&self) -> usize {
        self.completed.len()
    }
}

/// Read-only materializer over a finished entity store
pub struct Embedder<'a> {
    store: &'a EntityStore,
    namespace: &'a Namespace,
    stats: &'a StatsCollector,
}

impl<'a> Embedder<'a> {
    pub fn new(store: &'a EntityStore, namespace: &'a Namespace, stats: &'a StatsCollector) -> Self {
        Self {
            store,
            namespace,
            stats,
        }
    }

    /// Materialize one root. `None` when the root was never fetched.
    pub fn embed(&self, root: &str, state: &mut EmbedState) -> Option<JsonValue> {
        let node = self.store.get(root)?;
        Some(self.materialize(node, state))
    }

    /// Materialize several roots sharing one memo table
    pub fn embed_all(&self, roots: &[String]) -> Vec<(String, Option<JsonValue>)> {
        let mut state = EmbedState::new();
        roots
            .iter()
            .map(|root| (root.clone(), self.embed(root, &mut state)))
            .collect()
    }

    fn materialize(&self, node: &Node, state: &mut EmbedState) -> JsonValue {
        let id = node.id();

        if state.in_progress.contains(id) {
            return stub(id);
        }
        if let Some(done) = state.completed.get(id) {
            self.stats.record_cache_hit();
            return done.clone();
        }

        state.in_progress.insert(id.to_string());
        self.stats.record_embedded();

        let mut document = Map::new();
        document.insert(FULL_ID_KEY.to_string(), JsonValue::String(id.to_string()));
        document.insert(
            SHORT_ID_KEY.to_string(),
            JsonValue::String(local_id(id).to_string()),
        );

        for (key, value) in node.properties() {
            if key.starts_with('@') {
                continue;
            }
            let short_key = self.namespace.strip(key).to_string();
            let rendered = self.transform(value, state);
            document.insert(short_key, rendered);
        }

        state.in_progress.remove(id);
        let document = JsonValue::Object(document);
        state.completed.insert(id.to_string(), document.clone());
        document
    }

    fn transform(&self, value: &Value, state: &mut EmbedState) -> JsonValue {
        match value {
            Value::Scalar(literal) => literal.value.clone(),
            Value::Reference(iri) => match self.store.get(iri) {
                Some(node) => self.materialize(node, state),
                None => stub(iri),
            },
            Value::Sequence(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| self.transform(item, state))
                    .collect(),
            ),
        }
    }
}

/// Minimal placeholder for a cyclic or unfetched reference
pub fn stub(iri: &str) -> JsonValue {
    let mut document = Map::new();
    document.insert(FULL_ID_KEY.to_string(), JsonValue::String(iri.to_string()));
    document.insert(
        SHORT_ID_KEY.to_string(),
        JsonValue::String(local_id(iri).to_string()),
    );
    JsonValue::Object(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use serde_json::json;

    const NS: &str = "https://data.odis.be/";

    fn ns() -> Namespace {
        Namespace::new("odis", NS)
    }

    fn iri(local: &str) -> String {
        format!("{}n/{}", NS, local)
    }

    fn pred(name: &str) -> String {
        format!("{}{}", NS, name)
    }

    fn linked(local: &str, targets: &[&str]) -> Node {
        let mut node = Node::new(iri(local));
        node.set(pred("label"), Value::text(local));
        let refs: Vec<Value> = targets.iter().map(|t| Value::reference(iri(t))).collect();
        if let Some(value) = Value::from_items(refs) {
            node.set(pred("next"), value);
        }
        node
    }

    fn embed_one(store: &EntityStore, root: &str) -> (JsonValue, StatsCollector) {
        let stats = StatsCollector::new();
        let namespace = ns();
        let doc = Embedder::new(store, &namespace, &stats)
            .embed(&iri(root), &mut EmbedState::new())
            .unwrap();
        (doc, stats)
    }

    #[test]
    fn test_scalars_and_wrappers_unwrap() {
        let mut node = Node::new(iri("A"));
        node.set(pred("label"), Value::Scalar(Literal::tagged("Archief", "nl")));
        node.set(pred("year"), Value::Scalar(Literal::typed(1900, "xsd:gYear")));
        node.set("http://schema.org/name", Value::text("external key"));
        node.set("@type", Value::reference(pred("Archief")));
        let store: EntityStore = vec![node].into_iter().collect();

        let (doc, stats) = embed_one(&store, "A");
        assert_eq!(
            doc,
            json!({
                "_id": iri("A"),
                "id": "A",
                "label": "Archief",
                "year": 1900,
                "http://schema.org/name": "external key"
            })
        );
        assert_eq!(stats.snapshot().nodes_embedded, 1);
    }

    #[test]
    fn test_self_loop_terminates() {
        let store: EntityStore = vec![linked("A", &["A"])].into_iter().collect();
        let (doc, _) = embed_one(&store, "A");
        assert_eq!(doc["next"], json!({"_id": iri("A"), "id": "A"}));
    }

    #[test]
    fn test_two_cycle_yields_stub_back_reference() {
        let store: EntityStore = vec![linked("A", &["B"]), linked("B", &["A"])]
            .into_iter()
            .collect();
        let (doc, _) = embed_one(&store, "A");

        assert_eq!(doc["next"]["label"], json!("B"));
        assert_eq!(doc["next"]["next"], json!({"_id": iri("A"), "id": "A"}));
    }

    #[test]
    fn test_five_cycle_terminates() {
        let store: EntityStore = vec![
            linked("A", &["B"]),
            linked("B", &["C"]),
            linked("C", &["D"]),
            linked("D", &["E"]),
            linked("E", &["A"]),
        ]
        .into_iter()
        .collect();
        let (doc, stats) = embed_one(&store, "A");

        let tail = &doc["next"]["next"]["next"]["next"];
        assert_eq!(tail["id"], json!("E"));
        assert_eq!(tail["next"], json!({"_id": iri("A"), "id": "A"}));
        assert_eq!(stats.snapshot().nodes_embedded, 5);
    }

    #[test]
    fn test_shared_child_counts_cache_hits() {
        let store: EntityStore = vec![
            linked("Root", &["P1", "P2", "P3"]),
            linked("P1", &["Shared"]),
            linked("P2", &["Shared"]),
            linked("P3", &["Shared"]),
            linked("Shared", &[]),
        ]
        .into_iter()
        .collect();
        let (doc, stats) = embed_one(&store, "Root");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.nodes_embedded, 5);
        for parent in doc["next"].as_array().unwrap() {
            assert_eq!(parent["next"]["label"], json!("Shared"));
        }
    }

    #[test]
    fn test_unfetched_reference_is_stub() {
        let store: EntityStore = vec![linked("A", &["Missing"])].into_iter().collect();
        let (doc, _) = embed_one(&store, "A");
        assert_eq!(doc["next"], json!({"_id": iri("Missing"), "id": "Missing"}));
    }

    #[test]
    fn test_embed_all_shares_memo_and_reports_missing() {
        let store: EntityStore = vec![linked("A", &["C"]), linked("B", &["C"]), linked("C", &[])]
            .into_iter()
            .collect();
        let namespace = ns();
        let stats = StatsCollector::new();
        let embedder = Embedder::new(&store, &namespace, &stats);

        let results = embedder.embed_all(&[iri("A"), iri("B"), iri("Z")]);
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_some());
        assert!(results[1].1.is_some());
        assert!(results[2].1.is_none());
        assert_eq!(stats.snapshot().cache_hits, 1);
    }
}
