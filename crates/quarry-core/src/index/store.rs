//! Fragment store: owns indexed fragments and both search primitives.
//!
//! The store is built once per index build and read-only afterwards. Both
//! search operations are deterministic for a fixed index and embedder, and
//! an empty store answers every query with an empty result rather than an
//! error.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::errors::QuarryResult;
use crate::index::bm25::Bm25Index;
use crate::index::tokenizer::tokenize;
use crate::index::vector::{Embedder, FlatIndex};
use crate::models::{Fragment, ScoredFragment};

const FRAGMENTS_FILE: &str = "fragments.jsonl";
const BM25_FILE: &str = "bm25.json";
const VECTORS_FILE: &str = "vectors.json";

const EMBED_BATCH: usize = 256;

pub struct FragmentStore {
    fragments: Vec<Fragment>,
    corpus_tokens: Vec<Vec<String>>,
    bm25: Option<Bm25Index>,
    vectors: Option<FlatIndex>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl FragmentStore {
    pub fn empty() -> Self {
        Self {
            fragments: Vec::new(),
            corpus_tokens: Vec::new(),
            bm25: None,
            vectors: None,
            embedder: None,
        }
    }

    /// Build the lexical corpus and (when an embedder is attached) the
    /// vector index over the given fragments.
    pub fn build(
        fragments: Vec<Fragment>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> QuarryResult<Self> {
        let corpus_tokens: Vec<Vec<String>> = fragments
            .par_iter()
            .map(|fragment| tokenize(&fragment.text))
            .collect();
        let bm25 = if fragments.is_empty() {
            None
        } else {
            Some(Bm25Index::build(&corpus_tokens))
        };

        let vectors = match (&embedder, fragments.is_empty()) {
            (Some(embedder), false) => {
                let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
                let mut rows: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
                for batch in texts.chunks(EMBED_BATCH) {
                    rows.extend(embedder.embed(batch)?);
                }
                Some(FlatIndex::build(rows))
            }
            _ => None,
        };

        info!(
            fragments = fragments.len(),
            vectors = vectors.as_ref().map(|v| v.len()).unwrap_or(0),
            "fragment store built"
        );
        Ok(Self {
            fragments,
            corpus_tokens,
            bm25,
            vectors,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Rank fragments by BM25 relevance and return the top `k`.
    pub fn search_lexical(&self, query: &str, k: usize) -> Vec<ScoredFragment> {
        let bm25 = match &self.bm25 {
            Some(index) => index,
            None => return Vec::new(),
        };
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }
        bm25.top_k(&query_tokens, k)
            .into_iter()
            .map(|(index, score)| ScoredFragment::new(self.fragments[index].clone(), score))
            .collect()
    }

    /// Embed the query and return the `k` nearest fragments by cosine
    /// similarity. Without an embedder or vector index this degrades to an
    /// empty result.
    pub fn search_semantic(&self, query: &str, k: usize) -> QuarryResult<Vec<ScoredFragment>> {
        let (vectors, embedder) = match (&self.vectors, &self.embedder) {
            (Some(vectors), Some(embedder)) => (vectors, embedder),
            _ => {
                debug!("semantic search unavailable, returning empty result");
                return Ok(Vec::new());
            }
        };
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let embedded = embedder.embed(&[query.to_string()])?;
        let query_vector = match embedded.first() {
            Some(vector) => vector,
            None => return Ok(Vec::new()),
        };
        Ok(vectors
            .search(query_vector, k)
            .into_iter()
            .map(|(index, score)| {
                ScoredFragment::new(self.fragments[index].clone(), score as f64)
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persist the store under `dir`. Every artifact is written to a staging
    /// file first and renamed into place, so a torn write never loads.
    pub fn save(&self, dir: &Path) -> QuarryResult<()> {
        std::fs::create_dir_all(dir)?;

        let mut lines = String::new();
        for fragment in &self.fragments {
            lines.push_str(&serde_json::to_string(fragment)?);
            lines.push('\n');
        }
        write_staged(&dir.join(FRAGMENTS_FILE), lines.as_bytes())?;
        write_staged(
            &dir.join(BM25_FILE),
            serde_json::to_string(&self.corpus_tokens)?.as_bytes(),
        )?;
        if let Some(vectors) = &self.vectors {
            write_staged(
                &dir.join(VECTORS_FILE),
                serde_json::to_string(vectors)?.as_bytes(),
            )?;
        }
        Ok(())
    }

    /// Load a persisted store. A missing tokenized corpus is rebuilt from
    /// fragment text; a missing vector artifact disables semantic search.
    pub fn load(dir: &Path, embedder: Option<Arc<dyn Embedder>>) -> QuarryResult<Self> {
        let fragments_path = dir.join(FRAGMENTS_FILE);
        if !fragments_path.exists() {
            return Ok(Self::empty());
        }
        let mut fragments: Vec<Fragment> = Vec::new();
        for line in std::fs::read_to_string(&fragments_path)?.lines() {
            if line.trim().is_empty() {
                continue;
            }
            fragments.push(serde_json::from_str(line)?);
        }

        let bm25_path = dir.join(BM25_FILE);
        let corpus_tokens: Vec<Vec<String>> = if bm25_path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&bm25_path)?)?
        } else {
            debug!("tokenized corpus artifact missing, rebuilding from fragment text");
            fragments
                .par_iter()
                .map(|fragment| tokenize(&fragment.text))
                .collect()
        };
        let bm25 = if fragments.is_empty() {
            None
        } else {
            Some(Bm25Index::build(&corpus_tokens))
        };

        let vectors_path = dir.join(VECTORS_FILE);
        let vectors: Option<FlatIndex> = if vectors_path.exists() {
            Some(serde_json::from_str(&std::fs::read_to_string(
                &vectors_path,
            )?)?)
        } else {
            None
        };

        Ok(Self {
            fragments,
            corpus_tokens,
            bm25,
            vectors,
            embedder,
        })
    }
}

/// Write via a staging file plus rename so readers never observe a torn
/// artifact.
pub(crate) fn write_staged(path: &Path, bytes: &[u8]) -> QuarryResult<()> {
    let staging = path.with_extension("staging");
    std::fs::write(&staging, bytes)?;
    std::fs::rename(&staging, path)?;
    Ok(())
}
