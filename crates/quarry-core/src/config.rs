//! Process-wide configuration.
//!
//! All tuning knobs live here so callers construct one `QuarryConfig` at
//! process start and pass it down; nothing in the crate reads configuration
//! at import time. The confidence and expansion constants are heuristics,
//! kept configurable rather than hard-coded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::QuarryResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarryConfig {
    /// Directory holding the persisted fragment/vector/graph artifacts.
    pub index_dir: String,
    /// Directory holding the build manifest.
    pub cache_dir: String,

    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,

    /// Fragment splitting bounds, in characters.
    pub max_chars: usize,
    pub overlap_chars: usize,

    /// Candidate counts for the two search passes and the final cut.
    pub k_lexical: usize,
    pub k_semantic: usize,
    pub k_final: usize,

    /// Fragments included when formatting answer context.
    pub max_context_fragments: usize,
    /// Approximate token budget for the formatted context; the first
    /// fragment is always kept even when it alone exceeds the budget.
    pub max_context_tokens: i64,

    pub refinement_enabled: bool,
    /// Refinement triggers when answer confidence falls below this.
    pub confidence_threshold: f64,
    /// Confidence assigned when the answer admits ignorance.
    pub low_confidence_floor: f64,
    pub citation_bonus: f64,
    pub overlap_weight: f64,

    /// Score multiplier applied to graph-expansion fragments.
    pub expansion_discount: f64,
    pub max_expansion_hops: usize,
    pub max_expanded_per_seed: usize,
}

impl Default for QuarryConfig {
    fn default() -> Self {
        Self {
            index_dir: ".quarry/index".to_string(),
            cache_dir: ".quarry/cache".to_string(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            max_chars: 3500,
            overlap_chars: 250,
            k_lexical: 12,
            k_semantic: 12,
            k_final: 8,
            max_context_fragments: 8,
            max_context_tokens: 4000,
            refinement_enabled: true,
            confidence_threshold: 0.5,
            low_confidence_floor: 0.3,
            citation_bonus: 0.3,
            overlap_weight: 0.7,
            expansion_discount: 0.8,
            max_expansion_hops: 2,
            max_expanded_per_seed: 4,
        }
    }
}

impl QuarryConfig {
    pub fn from_json_file(path: &Path) -> QuarryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Directory holding the fragment store and graph artifacts.
    pub fn index_path(&self) -> PathBuf {
        PathBuf::from(&self.index_dir)
    }

    /// Directory holding the content manifest.
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }
}
