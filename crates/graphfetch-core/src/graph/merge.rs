//! Property-level merging of partial node observations
//!
//! Merging is keyed by property. Equal values are left alone, differing values
//! become a deduplicated sequence in first-seen order. The resulting *set* of
//! values per key does not depend on arrival order.

use std::collections::btree_map::Entry;

use super::node::{ID_KEY, Node};
use super::value::Value;

/// Merge `source` into `target`, both observations of the same identifier
pub fn merge_nodes(target: &mut Node, source: Node) {
    debug_assert_eq!(target.id(), source.id());

    for (key, value) in source.into_properties() {
        if key == ID_KEY {
            continue;
        }
        merge_property(target, key, value);
    }
}

/// Merge a single property value into `target`
pub fn merge_property(target: &mut Node, key: String, value: Value) {
    match target.properties_mut().entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(mut entry) => merge_values(entry.get_mut(), value),
    }
}

/// Combine `incoming` into `existing`.
///
/// Both sides are coerced into sequences, concatenated, and deduplicated
/// keeping the first occurrence.
pub fn merge_values(existing: &mut Value, incoming: Value) {
    if *existing == incoming {
        return;
    }

    let current = std::mem::replace(existing, Value::Sequence(Vec::new()));
    let mut items: Vec<Value> = Vec::new();
    for item in current.into_items().into_iter().chain(incoming.into_items()) {
        if !items.contains(&item) {
            items.push(item);
        }
    }

    if let Some(merged) = Value::from_items(items) {
        *existing = merged;
    }
}
