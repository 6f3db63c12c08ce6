//! JSON-LD graph documents → flat nodes

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::graph::{Namespace, Node};

/// Parse a store response body.
///
/// Accepts a single node object, an object with an `@graph` array, or a bare
/// array of node objects. An empty body or any other JSON shape yields no
/// nodes; invalid JSON is a `MalformedResponse`.
pub fn parse_graph(body: &str, namespace: &Namespace) -> Result<Vec<Node>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: JsonValue = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON-LD body: {}", e)))?;

    Ok(graph_nodes(&document)
        .iter()
        .filter_map(|node| Node::from_json(node, namespace))
        .collect())
}

fn graph_nodes(document: &JsonValue) -> &[JsonValue] {
    match document {
        JsonValue::Array(nodes) => nodes,
        JsonValue::Object(object) => match object.get("@graph") {
            Some(JsonValue::Array(nodes)) => nodes,
            Some(single @ JsonValue::Object(_)) => std::slice::from_ref(single),
            Some(_) => &[],
            None if object.contains_key("@id") => std::slice::from_ref(document),
            None => &[],
        },
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> Namespace {
        Namespace::new("odis", "https://data.odis.be/")
    }

    #[test]
    fn test_parse_graph_array_property() {
        let body = r#"{
            "@context": {},
            "@graph": [
                {"@id": "https://data.odis.be/a/1", "https://data.odis.be/label": "One"},
                {"@id": "https://data.odis.be/a/2", "https://data.odis.be/label": "Two"}
            ]
        }"#;
        let nodes = parse_graph(body, &ns()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].id(), "https://data.odis.be/a/2");
    }

    #[test]
    fn test_parse_single_node_object() {
        let body = r#"{"@id": "https://data.odis.be/a/1", "https://data.odis.be/label": "One"}"#;
        let nodes = parse_graph(body, &ns()).unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_parse_bare_array_skips_anonymous_nodes() {
        let body = r#"[{"@id": "https://data.odis.be/a/1"}, {"label": "no id"}]"#;
        let nodes = parse_graph(body, &ns()).unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_parse_empty_and_unexpected_shapes() {
        assert!(parse_graph("", &ns()).unwrap().is_empty());
        assert!(parse_graph("   \n", &ns()).unwrap().is_empty());
        assert!(parse_graph("{}", &ns()).unwrap().is_empty());
        assert!(parse_graph("42", &ns()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_graph("{\"@graph\": [", &ns()).unwrap_err();
        assert_eq!(err.code(), "E102");
    }
}
