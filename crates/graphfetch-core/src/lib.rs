//! Graphfetch Core Library
//!
//! This crate provides the core functionality for Graphfetch, including:
//! - CONSTRUCT query generation scoped to one namespace
//! - Triple store access (HTTP SPARQL endpoint, in-memory fixtures)
//! - Level-wise and multi-root breadth-first traversal
//! - Property-level merging of partial node observations
//! - Cycle-safe materialization into nested documents
//! - Per-call statistics and a TTL result cache

pub mod cache;
pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod ids;
pub mod query;
pub mod stats;
pub mod store;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheStore, FileCache, MemoryCache};
    pub use crate::config::{Config, Strategy};
    pub use crate::error::{Error, Result};
    pub use crate::fetch::{FetchOptions, FetchOutcome, GraphFetcher};
    pub use crate::graph::{Namespace, Node, Value};
    pub use crate::stats::Stats;
    pub use crate::store::{HttpStore, MemoryStore, TripleStore};
}
