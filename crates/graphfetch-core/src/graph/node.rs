//! Nodes and the per-fetch entity store

use std::collections::{BTreeMap, HashMap};

use serde_json::Value as JsonValue;

use super::iri::Namespace;
use super::merge;
use super::value::Value;

/// JSON-LD identifier key
pub const ID_KEY: &str = "@id";

/// JSON-LD type key
pub const TYPE_KEY: &str = "@type";

/// All properties observed for one identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: String,
    properties: BTreeMap<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Parse a JSON-LD node object. Returns `None` when it has no `@id`.
    pub fn from_json(json: &JsonValue, namespace: &Namespace) -> Option<Node> {
        let object = json.as_object()?;
        let id = object.get(ID_KEY)?.as_str()?;

        let mut node = Node::new(id);
        for (key, raw) in object {
            if key == ID_KEY {
                continue;
            }
            let parsed = if key == TYPE_KEY {
                parse_types(raw, namespace)
            } else {
                Value::from_json(raw, namespace)
            };
            if let Some(value) = parsed {
                node.set(key.clone(), value);
            }
        }
        Some(node)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a property, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn properties_mut(&mut self) -> &mut BTreeMap<String, Value> {
        &mut self.properties
    }

    pub fn into_properties(self) -> BTreeMap<String, Value> {
        self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Declared `@type` identifiers
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.properties
            .get(TYPE_KEY)
            .into_iter()
            .flat_map(Value::references)
    }

    /// In-namespace identifiers referenced by data properties.
    ///
    /// Keywords such as `@type` are never followed.
    pub fn linked_iris<'a>(
        &'a self,
        namespace: &'a Namespace,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.properties
            .iter()
            .filter(|(key, _)| !key.starts_with('@'))
            .flat_map(|(key, value)| value.references().map(move |iri| (key.as_str(), iri)))
            .filter(|(_, iri)| namespace.contains(iri))
    }

    /// Merge another observation of the same identifier into this one
    pub fn merge(&mut self, other: Node) {
        merge::merge_nodes(self, other);
    }

    /// Render back to a JSON-LD node object
    pub fn to_json(&self) -> JsonValue {
        let mut object = serde_json::Map::new();
        object.insert(ID_KEY.to_string(), JsonValue::String(self.id.clone()));
        for (key, value) in &self.properties {
            object.insert(key.clone(), value.to_json());
        }
        JsonValue::Object(object)
    }
}

/// `@type` values are IRIs even when written as bare strings
fn parse_types(raw: &JsonValue, namespace: &Namespace) -> Option<Value> {
    let items: Vec<Value> = match raw {
        JsonValue::String(s) => vec![Value::Reference(namespace.expand(s))],
        JsonValue::Array(values) => values
            .iter()
            .filter_map(JsonValue::as_str)
            .map(|s| Value::Reference(namespace.expand(s)))
            .collect(),
        _ => Vec::new(),
    };
    Value::from_items(items)
}

/// Accumulating identifier → node table for a single fetch.
///
/// Only the merge engine writes to it; the embedder reads it.
#[derive(Debug, Default, Clone)]
pub struct EntityStore {
    nodes: HashMap<String, Node>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a node in. Returns `true` when the identifier was not yet known.
    pub fn merge(&mut self, node: Node) -> bool {
        match self.nodes.get_mut(node.id()) {
            Some(existing) => {
                existing.merge(node);
                false
            }
            None => {
                self.nodes.insert(node.id().to_string(), node);
                true
            }
        }
    }

    /// Merge every node of another store. Returns how many were new.
    pub fn absorb(&mut self, other: EntityStore) -> usize {
        other
            .nodes
            .into_values()
            .map(|node| self.merge(node))
            .filter(|inserted| *inserted)
            .count()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
}

impl FromIterator<Node> for EntityStore {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut store = EntityStore::new();
        for node in iter {
            store.merge(node);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ns() -> Namespace {
        Namespace::new("odis", "https://data.odis.be/")
    }

    #[test]
    fn test_node_from_json() {
        let json = json!({
            "@id": "https://data.odis.be/archieven/A1",
            "@type": "odis:Archief",
            "https://data.odis.be/creator": {"@id": "https://data.odis.be/personen/P1"},
            "https://data.odis.be/label": {"@value": "Archief Een", "@language": "nl"},
            "https://data.odis.be/empty": []
        });

        let node = Node::from_json(&json, &ns()).unwrap();
        assert_eq!(node.id(), "https://data.odis.be/archieven/A1");
        assert_eq!(node.types().collect::<Vec<_>>(), vec!["https://data.odis.be/Archief"]);
        assert!(node.get("https://data.odis.be/empty").is_none());
        assert_eq!(
            node.linked_iris(&ns()).collect::<Vec<_>>(),
            vec![("https://data.odis.be/creator", "https://data.odis.be/personen/P1")]
        );
    }

    #[test]
    fn test_node_without_id_is_skipped() {
        assert!(Node::from_json(&json!({"label": "x"}), &ns()).is_none());
        assert!(Node::from_json(&json!("string"), &ns()).is_none());
    }

    #[test]
    fn test_linked_iris_skip_external_and_keywords() {
        let mut node = Node::new("https://data.odis.be/a/1");
        node.set("@type", Value::reference("https://data.odis.be/Archief"));
        node.set("seeAlso", Value::reference("https://viaf.org/123"));
        node.set(
            "related",
            Value::Sequence(vec![
                Value::reference("https://data.odis.be/a/2"),
                Value::text("note"),
            ]),
        );
        let namespace = ns();
        let linked: Vec<_> = node.linked_iris(&namespace).map(|(_, iri)| iri).collect();
        assert_eq!(linked, vec!["https://data.odis.be/a/2"]);
    }

    #[test]
    fn test_entity_store_merge_counts_new_nodes() {
        let mut store = EntityStore::new();
        let mut first = Node::new("x");
        first.set("a", Value::text("1"));
        let mut second = Node::new("x");
        second.set("b", Value::text("2"));

        assert!(store.merge(first));
        assert!(!store.merge(second));
        assert_eq!(store.len(), 1);

        let node = store.get("x").unwrap();
        assert!(node.get("a").is_some());
        assert!(node.get("b").is_some());
    }

    #[test]
    fn test_entity_store_absorb() {
        let mut left: EntityStore = vec![Node::new("a"), Node::new("b")].into_iter().collect();
        let right: EntityStore = vec![Node::new("b"), Node::new("c")].into_iter().collect();
        assert_eq!(left.absorb(right), 1);
        assert_eq!(left.len(), 3);
    }

    #[test]
    fn test_node_to_json() {
        let mut node = Node::new("https://data.odis.be/a/1");
        node.set("label", Value::text("One"));
        assert_eq!(
            node.to_json(),
            json!({"@id": "https://data.odis.be/a/1", "label": "One"})
        );
    }
}
