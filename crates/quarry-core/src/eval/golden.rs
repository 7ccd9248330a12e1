//! Curated query sets with known-good answers.
//!
//! A golden set pins the questions a deployment must keep answering well;
//! the metrics run against it to catch retrieval or prompting regressions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::QuarryResult;
use crate::index::store::write_staged;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoldenQuery {
    pub query: String,
    /// Expected answer content, matched by term overlap rather than exactly.
    pub ground_truth: String,
    /// Files a good answer should cite.
    pub expected_sources: Vec<String>,
    pub category: String,
    pub difficulty: String,
    pub tags: Vec<String>,
}

impl Default for GoldenQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            ground_truth: String::new(),
            expected_sources: Vec::new(),
            category: "general".to_string(),
            difficulty: "medium".to_string(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoldenSet {
    queries: Vec<GoldenQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoldenStats {
    pub total: usize,
    pub categories: BTreeMap<String, usize>,
    pub difficulties: BTreeMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct GoldenDoc {
    version: String,
    queries: Vec<GoldenQuery>,
}

impl GoldenSet {
    pub fn new(queries: Vec<GoldenQuery>) -> Self {
        Self { queries }
    }

    pub fn from_json_file(path: &Path) -> QuarryResult<Self> {
        let doc: GoldenDoc = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(Self {
            queries: doc.queries,
        })
    }

    pub fn to_json_file(&self, path: &Path) -> QuarryResult<()> {
        let doc = GoldenDoc {
            version: "1.0".to_string(),
            queries: self.queries.clone(),
        };
        write_staged(path, serde_json::to_vec_pretty(&doc)?.as_slice())
    }

    pub fn push(&mut self, query: GoldenQuery) {
        self.queries.push(query);
    }

    pub fn filter_by_category(&self, category: &str) -> GoldenSet {
        GoldenSet {
            queries: self
                .queries
                .iter()
                .filter(|q| q.category == category)
                .cloned()
                .collect(),
        }
    }

    pub fn filter_by_difficulty(&self, difficulty: &str) -> GoldenSet {
        GoldenSet {
            queries: self
                .queries
                .iter()
                .filter(|q| q.difficulty == difficulty)
                .cloned()
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GoldenQuery> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn stats(&self) -> GoldenStats {
        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        let mut difficulties: BTreeMap<String, usize> = BTreeMap::new();
        for query in &self.queries {
            *categories.entry(query.category.clone()).or_insert(0) += 1;
            *difficulties.entry(query.difficulty.clone()).or_insert(0) += 1;
        }
        GoldenStats {
            total: self.queries.len(),
            categories,
            difficulties,
        }
    }
}
