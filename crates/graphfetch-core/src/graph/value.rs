//! Property values of a fetched node

use serde_json::{Map, Value as JsonValue};

use super::iri::Namespace;

/// A literal as returned by the store, with its optional language tag or
/// datatype still attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: JsonValue,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl Literal {
    pub fn plain(value: impl Into<JsonValue>) -> Self {
        Self {
            value: value.into(),
            language: None,
            datatype: None,
        }
    }

    pub fn tagged(value: impl Into<JsonValue>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        }
    }

    pub fn typed(value: impl Into<JsonValue>, datatype: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        }
    }
}

/// A property value.
///
/// Produced once when the store response is parsed; the merge engine and
/// the embedder never look at raw JSON shapes again. A `Sequence` holds only
/// scalars and references, nested arrays are flattened at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Literal),
    Reference(String),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Scalar(Literal::plain(value.into()))
    }

    pub fn reference(iri: impl Into<String>) -> Self {
        Value::Reference(iri.into())
    }

    /// Build a value from a list of items, collapsing single items
    pub fn from_items(mut items: Vec<Value>) -> Option<Value> {
        match items.len() {
            0 => None,
            1 => items.pop(),
            _ => Some(Value::Sequence(items)),
        }
    }

    /// Coerce into a flat list of items
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Sequence(items) => items,
            other => vec![other],
        }
    }

    /// Borrow as a flat list of items
    pub fn items(&self) -> &[Value] {
        match self {
            Value::Sequence(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Every identifier this value references
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.items().iter().filter_map(|item| match item {
            Value::Reference(iri) => Some(iri.as_str()),
            _ => None,
        })
    }

    /// Parse one JSON-LD property value.
    ///
    /// `{"@id": ..}` becomes a reference, `{"@value": ..}` a literal keeping
    /// its tag, bare strings inside the namespace are references (compacted
    /// form), every other JSON scalar is a plain literal. Returns `None` for
    /// empty arrays and nulls.
    pub fn from_json(json: &JsonValue, namespace: &Namespace) -> Option<Value> {
        match json {
            JsonValue::Null => None,
            JsonValue::Array(values) => {
                let mut items = Vec::with_capacity(values.len());
                for value in values {
                    if let Some(parsed) = Value::from_json(value, namespace) {
                        for item in parsed.into_items() {
                            if !items.contains(&item) {
                                items.push(item);
                            }
                        }
                    }
                }
                Value::from_items(items)
            }
            JsonValue::Object(object) => Some(parse_object(object)),
            JsonValue::String(s) if namespace.contains(s) => Some(Value::Reference(s.clone())),
            scalar => Some(Value::Scalar(Literal::plain(scalar.clone()))),
        }
    }

    /// Render back to JSON-LD, the inverse of [`Value::from_json`]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Reference(iri) => serde_json::json!({ "@id": iri }),
            Value::Scalar(literal) => match (&literal.language, &literal.datatype) {
                (Some(lang), _) => serde_json::json!({ "@value": literal.value, "@language": lang }),
                (None, Some(dt)) => serde_json::json!({ "@value": literal.value, "@type": dt }),
                (None, None) => literal.value.clone(),
            },
            Value::Sequence(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

fn parse_object(object: &Map<String, JsonValue>) -> Value {
    if let Some(JsonValue::String(iri)) = object.get("@id") {
        return Value::Reference(iri.clone());
    }
    if let Some(value) = object.get("@value") {
        return Value::Scalar(Literal {
            value: value.clone(),
            language: object
                .get("@language")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            datatype: object
                .get("@type")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
        });
    }
    // An object that is neither a reference nor a literal wrapper
    Value::Scalar(Literal::plain(JsonValue::Object(object.clone())))
}
