//! Core data structures shared across the index, graph, and retrieval layers.

use serde::{Deserialize, Serialize};

/// Prefix marking an unresolved reference to something outside the indexed
/// tree. External ids are valid edge endpoints but never first-class
/// entities: traversal may pass through them, results never include them.
pub const EXTERNAL_PREFIX: &str = "<external>:";

pub fn external_id(name: &str) -> String {
    format!("{EXTERNAL_PREFIX}{name}")
}

pub fn is_external(id: &str) -> bool {
    id.starts_with(EXTERNAL_PREFIX)
}

// ---------------------------------------------------------------------------
// Fragments
// ---------------------------------------------------------------------------

/// Provenance and location data attached to a fragment.
///
/// `path` is always present; code fragments carry a line range, page-oriented
/// fragments (e.g. PDF extractions) a page number instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    #[serde(rename = "type")]
    pub source_type: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Definition kind for code fragments ("function", "class", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// For graph-expansion fragments: the entity the context describes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_entity: Option<String>,
    /// Split bookkeeping for long fragments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<i64>,
}

/// An indexed chunk of text with a stable content-derived id.
///
/// Identity is a hash of source location plus content, so identical content
/// at the same position always yields the same id. That id is the dedup key
/// everywhere downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub text: String,
    #[serde(rename = "meta")]
    pub metadata: FragmentMetadata,
}

/// A fragment paired with a retrieval score.
///
/// Scores are only comparable within one retrieval call's result set; the
/// scale differs between BM25, cosine similarity, and reranker logits.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f64,
}

impl ScoredFragment {
    pub fn new(fragment: Fragment, score: f64) -> Self {
        Self { fragment, score }
    }

    pub fn id(&self) -> &str {
        &self.fragment.id
    }
}

// ---------------------------------------------------------------------------
// Graph entities and relations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Module,
    Function,
    Class,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Module => "module",
            EntityKind::Function => "function",
            EntityKind::Class => "class",
        }
    }
}

/// A code entity extracted from structural analysis.
///
/// Ids are `file:name` for definitions and the bare file path for modules,
/// unique within one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub file: String,
    pub line_start: i64,
    pub line_end: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Calls,
    Inherits,
    Imports,
    Defines,
}

/// A directed edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub source_id: String,
    pub target_id: String,
    pub kind: RelationKind,
}

impl Relation {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
        }
    }
}
