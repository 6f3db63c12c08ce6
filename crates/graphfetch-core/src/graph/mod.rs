//! Graph data model
//!
//! This module provides:
//! - Namespace and prefix handling for identifiers
//! - The closed `Value` type produced when a store response is parsed
//! - Nodes and the per-fetch entity store
//! - The merge engine for partial observations of the same node

mod iri;
mod merge;
mod node;
mod value;

pub use iri::{DEFAULT_PREFIXES, Namespace, local_id, type_local_name};
pub use merge::{merge_nodes, merge_property, merge_values};
pub use node::{EntityStore, ID_KEY, Node, TYPE_KEY};
pub use value::{Literal, Value};
