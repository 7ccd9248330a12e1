//! Question answering over the retrieval pipeline.
//!
//! One pass retrieves, prompts, and scores. A low-confidence answer earns
//! exactly one refined pass: the query is extended with an identifier from
//! the first answer, and the second retrieval must surface at least one new
//! fragment before the model is asked again. Whatever the second pass
//! produces is final; there is never a third.

use tracing::{debug, info, warn};

use crate::config::QuarryConfig;
use crate::errors::QuarryResult;
use crate::guards;
use crate::index::tokenizer::estimate_tokens;
use crate::models::ScoredFragment;
use crate::qa::confidence::score_answer;
use crate::qa::intent::{classify, QueryIntent};
use crate::qa::refine::{merge_hits, refine_query};
use crate::retrieve::fusion::Retriever;

/// Completion backend for answer generation.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str) -> QuarryResult<String>;
}

/// Stages the answer loop passed through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    InitialRetrieval,
    AnswerGenerated,
    ConfidenceScored,
    RefinedRetrieval,
    RefinedAnswerGenerated,
    Done,
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub answer: String,
    /// Absent when no fragments matched and the model was never asked.
    pub confidence: Option<f64>,
    pub intent: QueryIntent,
    pub refined: bool,
    pub states: Vec<LoopState>,
    pub hits: Vec<ScoredFragment>,
}

pub struct Orchestrator<R: Retriever, L: LanguageModel> {
    retriever: R,
    model: L,
    config: QuarryConfig,
}

const NO_CONTEXT_ANSWER: &str =
    "No relevant fragments were found in the index for this question.";

impl<R: Retriever, L: LanguageModel> Orchestrator<R, L> {
    pub fn new(retriever: R, model: L, config: QuarryConfig) -> Self {
        Self {
            retriever,
            model,
            config,
        }
    }

    pub fn query(&self, question: &str) -> QuarryResult<QueryOutcome> {
        let question = guards::truncate_query(question);
        let intent = classify(&question);
        let mut states = vec![LoopState::InitialRetrieval];

        let hits = self.retriever.retrieve(
            &question,
            self.config.k_lexical,
            self.config.k_semantic,
            self.config.k_final,
        )?;
        if hits.is_empty() {
            states.push(LoopState::Done);
            return Ok(QueryOutcome {
                answer: NO_CONTEXT_ANSWER.to_string(),
                confidence: None,
                intent,
                refined: false,
                states,
                hits,
            });
        }

        let mut answer = self.generate(&question, &hits);
        states.push(LoopState::AnswerGenerated);
        let mut confidence = score_answer(&question, &answer, &self.config);
        states.push(LoopState::ConfidenceScored);
        debug!(confidence, intent = intent.as_str(), "first pass scored");

        let mut refined = false;
        let mut final_hits = hits;
        if self.config.refinement_enabled && confidence < self.config.confidence_threshold {
            states.push(LoopState::RefinedRetrieval);
            let refined_query = refine_query(&question, &answer);
            let second = self.retriever.retrieve(
                &refined_query,
                self.config.k_lexical,
                self.config.k_semantic,
                self.config.k_final,
            )?;
            let has_new = second
                .iter()
                .any(|hit| final_hits.iter().all(|seen| seen.id() != hit.id()));
            if has_new {
                final_hits = merge_hits(final_hits, second);
                answer = self.generate(&question, &final_hits);
                states.push(LoopState::RefinedAnswerGenerated);
                confidence = score_answer(&question, &answer, &self.config);
                refined = true;
                info!(confidence, query = %refined_query, "refined pass complete");
            } else {
                debug!(query = %refined_query, "refined retrieval found nothing new");
            }
        }

        states.push(LoopState::Done);
        Ok(QueryOutcome {
            answer,
            confidence: Some(confidence),
            intent,
            refined,
            states,
            hits: final_hits,
        })
    }

    /// Composed refinement step for callers that run generation themselves:
    /// score the answer they already have, and when it falls below the
    /// threshold, re-query with a refined query and merge new fragments in.
    /// Returns the context for the next generation plus the confidence of
    /// the answer that was handed in.
    pub fn refine_and_retrieve(
        &self,
        question: &str,
        first_answer: &str,
        first_hits: Vec<ScoredFragment>,
    ) -> QuarryResult<(String, f64)> {
        let question = guards::truncate_query(question);
        let confidence = score_answer(&question, first_answer, &self.config);
        let mut hits = first_hits;
        if self.config.refinement_enabled && confidence < self.config.confidence_threshold {
            let refined_query = refine_query(&question, first_answer);
            let second = self.retriever.retrieve(
                &refined_query,
                self.config.k_lexical,
                self.config.k_semantic,
                self.config.k_final,
            )?;
            hits = merge_hits(hits, second);
        }
        let context = format_context(
            &hits,
            self.config.max_context_fragments,
            self.config.max_context_tokens,
        );
        Ok((context, confidence))
    }

    /// Prompt the model over the formatted context. A model failure becomes
    /// a textual answer so one flaky completion never sinks the whole query.
    fn generate(&self, question: &str, hits: &[ScoredFragment]) -> String {
        let context = format_context(
            hits,
            self.config.max_context_fragments,
            self.config.max_context_tokens,
        );
        let prompt = format!(
            "Answer the question using only the context below. Cite the \
             fragments you used as [Source N]. If the context does not \
             contain the answer, say that you cannot find it.\n\n\
             Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
        );
        match self.model.complete(&prompt) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "completion failed");
                format!("The model was unable to produce an answer: {e}")
            }
        }
    }
}

/// Render hits as numbered, citable context blocks, bounded both by
/// fragment count and by an approximate token budget. The first fragment is
/// always kept so a non-empty hit list never formats to empty context.
pub fn format_context(hits: &[ScoredFragment], max_fragments: usize, max_tokens: i64) -> String {
    let max_fragments = max_fragments.min(guards::MAX_CONTEXT_FRAGMENTS);
    let mut blocks: Vec<String> = Vec::new();
    let mut spent = 0i64;
    for (i, hit) in hits.iter().take(max_fragments).enumerate() {
        let meta = &hit.fragment.metadata;
        let location = if let Some(page) = meta.page {
            format!("{} (page {page})", meta.path)
        } else if let (Some(start), Some(end)) = (meta.start_line, meta.end_line) {
            format!("{}:{start}-{end}", meta.path)
        } else {
            meta.path.clone()
        };
        let block = format!("[Source {}] {location}\n{}", i + 1, hit.fragment.text);
        let cost = estimate_tokens(&block);
        if !blocks.is_empty() && spent + cost > max_tokens {
            break;
        }
        spent += cost;
        blocks.push(block);
    }
    blocks.join("\n---\n")
}
