//! Query refinement for the second retrieval pass.
//!
//! A low-confidence first answer often names the right identifier without
//! grounding it. Appending that identifier to the query steers the second
//! pass toward fragments the first one missed.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::models::ScoredFragment;

// camelCase or snake_case identifiers, the tokens most likely to be code
// names rather than prose.
static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+[A-Z]\w+|[a-z_]+_[a-z_]+)\b").unwrap());

/// Extend `query` with the first identifier-looking token of `answer`.
/// Returns the query unchanged when the answer names nothing new.
pub fn refine_query(query: &str, answer: &str) -> String {
    let Some(m) = IDENT_RE.find(answer) else {
        return query.to_string();
    };
    let ident = m.as_str();
    if query.contains(ident) {
        return query.to_string();
    }
    format!("{query} {ident}")
}

/// Merge two hit lists, first list winning id collisions.
pub fn merge_hits(
    first: Vec<ScoredFragment>,
    second: Vec<ScoredFragment>,
) -> Vec<ScoredFragment> {
    let mut merged: IndexMap<String, ScoredFragment> = IndexMap::new();
    for hit in first.into_iter().chain(second) {
        merged.entry(hit.id().to_string()).or_insert(hit);
    }
    merged.into_values().collect()
}
