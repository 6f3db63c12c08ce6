//! CONSTRUCT query generation
//!
//! Every query built here is a pure function of its inputs, so identical
//! requests produce byte-identical queries.

use std::fmt::Write as _;

use crate::config::MAX_DEPTH;
use crate::graph::Namespace;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// A subject to query plus an optional best-effort type guess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub iri: String,
    pub type_hint: Option<String>,
}

impl Subject {
    pub fn new(iri: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            type_hint: None,
        }
    }

    pub fn hinted(iri: impl Into<String>, type_hint: Option<String>) -> Self {
        Self {
            iri: iri.into(),
            type_hint,
        }
    }
}

/// Builds CONSTRUCT queries scoped to one namespace
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    namespace: Namespace,
}

impl QueryBuilder {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// One hop from subjects that must carry `entity_type`
    pub fn root_level(&self, subjects: &[String], entity_type: &str, language: &str) -> String {
        let type_iri = self.namespace.expand(entity_type);
        let mut query = self.prefix_declarations();

        let _ = write!(
            query,
            "\nCONSTRUCT {{\n  ?subject a <{ty}> ;\n           ?property ?value .\n}}\nWHERE {{\n",
            ty = type_iri
        );
        query.push_str(&values_clause("subject", subjects.iter().map(String::as_str)));
        let _ = writeln!(
            query,
            "  ?subject a <{ty}> ;\n           ?property ?value .",
            ty = type_iri
        );
        query.push_str(&self.property_filter("property", false));
        query.push_str(&value_filter("value", language));
        query.push_str("}\n");
        query
    }

    /// One hop from arbitrary subjects
    pub fn level(&self, subjects: &[String], language: &str) -> String {
        let mut query = self.prefix_declarations();
        query.push_str("\nCONSTRUCT {\n  ?subject ?property ?value .\n}\nWHERE {\n");
        query.push_str(&values_clause("subject", subjects.iter().map(String::as_str)));
        query.push_str("  ?subject ?property ?value .\n");
        query.push_str(&self.property_filter("property", false));
        query.push_str(&value_filter("value", language));
        query.push_str("}\n");
        query
    }

    /// One hop for a traversal batch: namespace predicates plus `rdf:type`.
    ///
    /// Type hints are emitted as comments only; they never narrow the match.
    pub fn batch(&self, subjects: &[Subject], language: &str) -> String {
        let mut query = String::new();
        for subject in subjects {
            if let Some(hint) = &subject.type_hint {
                let _ = writeln!(query, "# <{}> expected {}", subject.iri, hint);
            }
        }
        query.push_str(&self.prefix_declarations());
        query.push_str("\nCONSTRUCT {\n  ?subject ?property ?value .\n}\nWHERE {\n");
        query.push_str(&values_clause(
            "subject",
            subjects.iter().map(|s| s.iri.as_str()),
        ));
        query.push_str("  ?subject ?property ?value .\n");
        query.push_str(&self.property_filter("property", true));
        query.push_str(&value_filter("value", language));
        query.push_str("}\n");
        query
    }

    /// The whole N-hop neighborhood of typed roots in a single query.
    ///
    /// Level 0 is restricted to `entity_type`; level `i` follows IRI values
    /// of level `i - 1` through any in-namespace predicate. Levels are joined
    /// with UNION. `depth` is clamped to `1..=MAX_DEPTH` levels.
    pub fn neighborhood(
        &self,
        subjects: &[String],
        entity_type: &str,
        depth: usize,
        language: &str,
    ) -> String {
        let levels = clamp_depth(depth).max(1);
        let type_iri = self.namespace.expand(entity_type);
        let mut query = self.prefix_declarations();

        query.push_str("\nCONSTRUCT {\n");
        let _ = writeln!(query, "  ?s0 a <{}> .", type_iri);
        for level in 0..levels {
            let _ = writeln!(query, "  ?s{l} ?p{l} ?s{n} .", l = level, n = level + 1);
        }
        query.push_str("}\nWHERE {\n");
        query.push_str(&values_clause("s0", subjects.iter().map(String::as_str)));
        let _ = writeln!(query, "  ?s0 a <{}> .", type_iri);

        for level in 0..levels {
            if level > 0 {
                query.push_str("  UNION\n");
            }
            query.push_str("  {\n");
            for hop in 0..=level {
                let _ = writeln!(query, "    ?s{h} ?p{h} ?s{n} .", h = hop, n = hop + 1);
                query.push_str(&indent(&self.property_filter(&format!("p{}", hop), false)));
                if hop < level {
                    let _ = writeln!(query, "    FILTER(isIRI(?s{}))", hop + 1);
                }
            }
            query.push_str(&indent(&value_filter(&format!("s{}", level + 1), language)));
            query.push_str("  }\n");
        }
        query.push_str("}\n");
        query
    }

    fn prefix_declarations(&self) -> String {
        let mut out = String::new();
        for (prefix, iri) in self.namespace.prefixes() {
            let _ = writeln!(out, "PREFIX {}: <{}>", prefix, iri);
        }
        out
    }

    fn property_filter(&self, var: &str, allow_type: bool) -> String {
        if allow_type {
            format!(
                "  FILTER(STRSTARTS(STR(?{v}), \"{ns}\") || ?{v} = <{rdf_type}>)\n",
                v = var,
                ns = self.namespace.iri(),
                rdf_type = RDF_TYPE
            )
        } else {
            format!(
                "  FILTER(STRSTARTS(STR(?{v}), \"{ns}\"))\n",
                v = var,
                ns = self.namespace.iri()
            )
        }
    }
}

/// Depth clamped to the supported maximum
pub fn clamp_depth(depth: usize) -> usize {
    depth.min(MAX_DEPTH)
}

/// Accept IRIs and literals whose language matches or that carry none
fn value_filter(var: &str, language: &str) -> String {
    let language = sanitize_language(language);
    format!(
        "  FILTER(\n    isIRI(?{v}) ||\n    (isLiteral(?{v}) && (LANG(?{v}) = \"{lang}\" || LANG(?{v}) = \"\"))\n  )\n",
        v = var,
        lang = language
    )
}

fn values_clause<'a>(var: &str, subjects: impl Iterator<Item = &'a str>) -> String {
    let mut out = format!("  VALUES ?{} {{\n", var);
    for subject in subjects {
        let _ = writeln!(out, "    <{}>", subject);
    }
    out.push_str("  }\n");
    out
}

fn sanitize_language(language: &str) -> String {
    language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| format!("  {}\n", line))
        .collect()
}
