//! Triple store access
//!
//! This module provides:
//! - The `TripleStore` seam every traversal strategy queries through
//! - An HTTP client for SPARQL endpoints returning JSON-LD
//! - An in-memory store for offline fixtures and tests
//! - `StoreClient`, which times every request and turns transient failures
//!   into empty results

mod client;
mod http;
mod memory;
mod parse;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::Node;

pub use client::StoreClient;
pub use http::{HttpStore, HttpStoreBuilder};
pub use memory::MemoryStore;
pub use parse::parse_graph;

/// What a request asks the store for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// One hop from subjects carrying the given type
    Root { entity_type: String },
    /// One hop from arbitrary subjects
    Level,
    /// One hop for a traversal batch, `rdf:type` included
    Batch,
    /// Several hops from typed roots in a single query
    Neighborhood { entity_type: String, depth: usize },
}

/// A built query together with the inputs it was built from.
///
/// Remote stores only need `query`; in-memory stores evaluate the
/// structured fields instead of parsing SPARQL.
#[derive(Debug, Clone)]
pub struct GraphRequest {
    pub kind: RequestKind,
    pub subjects: Vec<String>,
    pub language: String,
    pub query: String,
}

impl GraphRequest {
    pub fn new(
        kind: RequestKind,
        subjects: Vec<String>,
        language: impl Into<String>,
        query: String,
    ) -> Self {
        Self {
            kind,
            subjects,
            language: language.into(),
            query,
        }
    }
}

/// A graph store that answers CONSTRUCT-style requests with flat nodes
#[async_trait]
pub trait TripleStore: Send + Sync {
    async fn construct(&self, request: &GraphRequest) -> Result<Vec<Node>>;
}
