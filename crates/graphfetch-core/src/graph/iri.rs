//! Namespace and prefix handling for IRIs

use std::collections::BTreeMap;

/// Prefixes every query declares regardless of configuration
pub const DEFAULT_PREFIXES: [(&str, &str); 2] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
];

/// The graph's own namespace plus the prefix table used to expand names.
///
/// Identifiers that start with the namespace IRI are traversal candidates;
/// everything else is treated as an opaque external link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
    iri: String,
    prefixes: BTreeMap<String, String>,
    collections: BTreeMap<String, String>,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let iri = iri.into();

        let mut prefixes: BTreeMap<String, String> = DEFAULT_PREFIXES
            .iter()
            .map(|(p, i)| (p.to_string(), i.to_string()))
            .collect();
        prefixes.insert(prefix.clone(), iri.clone());

        Self {
            prefix,
            iri,
            prefixes,
            collections: BTreeMap::new(),
        }
    }

    /// Attach the type → path segment table used to build and classify IRIs
    pub fn with_collections(mut self, collections: BTreeMap<String, String>) -> Self {
        self.collections = collections;
        self
    }

    /// Declare an additional prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), iri.into());
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }

    /// Whether the identifier belongs to this graph
    pub fn contains(&self, iri: &str) -> bool {
        iri.starts_with(&self.iri)
    }

    /// Expand `prefix:local` through the prefix table.
    ///
    /// Absolute IRIs and unknown prefixes are returned unchanged.
    pub fn expand(&self, name: &str) -> String {
        if name.starts_with("http") {
            return name.to_string();
        }
        match name.split_once(':') {
            Some((prefix, local)) => match self.prefixes.get(prefix) {
                Some(base) => format!("{}{}", base, local),
                None => name.to_string(),
            },
            None => name.to_string(),
        }
    }

    /// Strip the namespace from an in-namespace IRI, e.g. a predicate
    pub fn strip<'a>(&self, iri: &'a str) -> &'a str {
        iri.strip_prefix(self.iri.as_str()).unwrap_or(iri)
    }

    /// IRI path segment holding entities of the given type
    pub fn collection_for(&self, entity_type: &str) -> String {
        let name = type_local_name(entity_type);
        match self.collections.get(name) {
            Some(segment) => segment.clone(),
            None => format!("{}s", name.to_lowercase()),
        }
    }

    /// Full IRI of an entity of `entity_type` with short id `id`
    pub fn entity_iri(&self, entity_type: &str, id: &str) -> String {
        format!("{}{}/{}", self.iri, self.collection_for(entity_type), id)
    }

    /// Best-effort type for an in-namespace IRI, from its collection segment
    pub fn type_for_iri(&self, iri: &str) -> Option<String> {
        if !self.contains(iri) {
            return None;
        }
        let segment = self.strip(iri).split('/').next()?;
        self.collections
            .iter()
            .find(|(_, s)| s.as_str() == segment)
            .map(|(ty, _)| format!("{}:{}", self.prefix, ty))
    }

    /// Best-effort type for the target of a predicate named after a known type,
    /// e.g. `odis:archief` → `odis:Archief`
    pub fn type_for_property(&self, predicate: &str) -> Option<String> {
        if !self.contains(predicate) {
            return None;
        }
        let name = local_id(predicate);
        self.collections
            .keys()
            .find(|ty| ty.eq_ignore_ascii_case(name))
            .map(|ty| format!("{}:{}", self.prefix, ty))
    }
}

/// The last path segment of an IRI, used as the short `id` of a document
pub fn local_id(iri: &str) -> &str {
    iri.trim_end_matches('/')
        .rsplit(['/', '#'])
        .next()
        .unwrap_or(iri)
}

/// `ns:Archief` → `Archief`, `https://x/Archief` → `Archief`
pub fn type_local_name(entity_type: &str) -> &str {
    if entity_type.starts_with("http") {
        return local_id(entity_type);
    }
    entity_type
        .split_once(':')
        .map(|(_, local)| local)
        .unwrap_or(entity_type)
}
