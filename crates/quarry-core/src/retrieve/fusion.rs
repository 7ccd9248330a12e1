//! Hybrid retrieval: lexical and semantic candidate lists fused into one
//! ranking, with an optional cross-encoder rerank on top.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::QuarryResult;
use crate::guards;
use crate::index::store::FragmentStore;
use crate::models::ScoredFragment;

/// Anything that can answer a query with ranked fragments.
pub trait Retriever: Send + Sync {
    fn retrieve(
        &self,
        query: &str,
        k_lexical: usize,
        k_semantic: usize,
        k_final: usize,
    ) -> QuarryResult<Vec<ScoredFragment>>;
}

/// Pairwise relevance model scoring `texts` against one query.
pub trait RerankModel: Send + Sync {
    fn score(&self, query: &str, texts: &[String]) -> QuarryResult<Vec<f64>>;
}

pub struct HybridRetriever {
    store: Arc<FragmentStore>,
    reranker: Option<Box<dyn RerankModel>>,
}

impl HybridRetriever {
    pub fn new(store: Arc<FragmentStore>) -> Self {
        Self {
            store,
            reranker: None,
        }
    }

    pub fn with_reranker(store: Arc<FragmentStore>, reranker: Box<dyn RerankModel>) -> Self {
        Self {
            store,
            reranker: Some(reranker),
        }
    }
}

impl Retriever for HybridRetriever {
    fn retrieve(
        &self,
        query: &str,
        k_lexical: usize,
        k_semantic: usize,
        k_final: usize,
    ) -> QuarryResult<Vec<ScoredFragment>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query = guards::truncate_query(query);
        let k_lexical = guards::clamp_limit(k_lexical, guards::MAX_RESULT_LIMIT);
        let k_semantic = guards::clamp_limit(k_semantic, guards::MAX_RESULT_LIMIT);
        let k_final = guards::clamp_limit(k_final, guards::MAX_RESULT_LIMIT);

        let lexical = self.store.search_lexical(&query, k_lexical);
        let semantic = self.store.search_semantic(&query, k_semantic)?;
        debug!(
            lexical = lexical.len(),
            semantic = semantic.len(),
            "candidate lists"
        );

        // Lexical hits enter first; on an id collision the first occurrence
        // keeps its score.
        let mut fused: IndexMap<String, ScoredFragment> = IndexMap::new();
        for hit in lexical.into_iter().chain(semantic) {
            fused.entry(hit.id().to_string()).or_insert(hit);
        }
        let mut hits: Vec<ScoredFragment> = fused.into_values().collect();

        if let Some(reranker) = &self.reranker {
            let texts: Vec<String> = hits.iter().map(|h| h.fragment.text.clone()).collect();
            let scores = reranker.score(&query, &texts)?;
            for (hit, score) in hits.iter_mut().zip(scores) {
                hit.score = score;
            }
            hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        hits.truncate(k_final);
        Ok(hits)
    }
}

#[cfg(feature = "fastembed")]
pub mod backend {
    //! Cross-encoder reranking through fastembed.

    use fastembed::{RerankInitOptions, TextRerank};

    use crate::errors::{QuarryError, QuarryResult};
    use crate::retrieve::fusion::RerankModel;

    pub struct FastRerankModel {
        model: TextRerank,
    }

    impl FastRerankModel {
        pub fn new() -> QuarryResult<Self> {
            let model = TextRerank::try_new(RerankInitOptions::default())
                .map_err(|e| QuarryError::Model(e.to_string()))?;
            Ok(Self { model })
        }
    }

    impl RerankModel for FastRerankModel {
        fn score(&self, query: &str, texts: &[String]) -> QuarryResult<Vec<f64>> {
            let documents: Vec<&str> = texts.iter().map(|t| t.as_str()).collect();
            let results = self
                .model
                .rerank(query, &documents, true, None)
                .map_err(|e| QuarryError::Model(e.to_string()))?;
            // fastembed returns results sorted by score; restore input order.
            let mut scores = vec![0.0f64; texts.len()];
            for result in results {
                if let Some(slot) = scores.get_mut(result.index) {
                    *slot = result.score as f64;
                }
            }
            Ok(scores)
        }
    }
}
