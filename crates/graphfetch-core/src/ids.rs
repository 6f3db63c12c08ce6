//! Root identifier normalization

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::graph::Namespace;

/// Split a comma-separated id string into trimmed, non-empty parts
pub fn split_ids(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turn user supplied ids into full entity IRIs.
///
/// Absolute IRIs pass through when they lie inside the namespace and can be
/// written as an IRI reference; anything else is `InvalidInput`. Short ids
/// are stripped of anything outside `[A-Za-z0-9-]` and placed in the
/// collection of `entity_type`. Duplicates are dropped, first occurrence
/// wins. Fails with `EmptyIdList` when nothing usable remains.
pub fn normalize_ids<S: AsRef<str>>(
    ids: &[S],
    entity_type: &str,
    namespace: &Namespace,
) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(ids.len());

    for raw in ids.iter().flat_map(|id| split_ids(id.as_ref())) {
        let iri = if is_absolute(&raw) {
            check_iri(&raw, namespace)?;
            raw
        } else {
            let short = sanitize_id(&raw);
            if short.is_empty() {
                continue;
            }
            namespace.entity_iri(entity_type, &short)
        };
        if seen.insert(iri.clone()) {
            out.push(iri);
        }
    }

    if out.is_empty() {
        return Err(Error::EmptyIdList);
    }
    Ok(out)
}

/// Reject entity types that cannot be expanded into an IRI
pub fn validate_entity_type(entity_type: &str) -> Result<()> {
    let trimmed = entity_type.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("entity type is required".to_string()));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c == '<' || c == '>') {
        return Err(Error::InvalidInput(format!(
            "entity type '{}' contains illegal characters",
            entity_type
        )));
    }
    Ok(())
}

fn is_absolute(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// Characters that may not appear inside `<...>` in a query
const IRI_FORBIDDEN: &[char] = &['<', '>', '"', '{', '}', '|', '^', '`', '\\'];

fn check_iri(iri: &str, namespace: &Namespace) -> Result<()> {
    if iri
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || IRI_FORBIDDEN.contains(&c))
    {
        return Err(Error::InvalidInput(format!(
            "identifier '{}' contains characters not allowed in an IRI",
            iri
        )));
    }
    if !namespace.contains(iri) {
        return Err(Error::InvalidInput(format!(
            "identifier '{}' is outside the namespace {}",
            iri,
            namespace.iri()
        )));
    }
    Ok(())
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}
