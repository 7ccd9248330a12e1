//! Answer-quality metrics for offline evaluation.
//!
//! Heuristic stand-ins for judge-model scoring: word overlap approximates
//! claim verification, and file citations the context never produced are
//! penalized. Scores are only comparable against each other, not against
//! an absolute quality bar.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::index::tokenizer::tokenize;

static FILE_CITE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w/]+\.(?:py|md|txt|json|csv|pdf)(?::\d+)?").unwrap());

static REFUSAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"i (?:don't|do not|cannot|can't) (?:know|find|have)",
        r"|cannot find this information",
        r"|no information (?:available|found)",
        r"|not (?:enough|sufficient) (?:context|information)",
    ))
    .unwrap()
});

/// Wider net than the confidence scorer's list; evaluation wants content
/// words only, so auxiliaries and prepositions all drop out.
const EVAL_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
    "can", "need", "ought", "used", "to", "of", "in", "for", "on", "with", "at", "by", "from",
    "as", "into", "through", "during", "before", "after", "above", "below", "between", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not", "only", "own",
    "same", "so", "than", "too", "very", "just", "and", "but", "if", "or", "because", "until",
    "while", "what", "which", "who", "this", "that", "these", "those", "i", "you", "he", "she",
    "it", "we", "they",
];

/// One query's worth of pipeline output to score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalSample {
    pub query: String,
    pub answer: String,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub ground_truth: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub query: String,
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub context_precision: f64,
    pub context_recall: f64,
}

impl EvalResult {
    /// Weighted overall score; generation quality weighs slightly more
    /// than retrieval quality.
    pub fn overall(&self) -> f64 {
        0.3 * self.faithfulness
            + 0.3 * self.answer_relevancy
            + 0.2 * self.context_precision
            + 0.2 * self.context_recall
    }
}

/// Batch averages across every metric.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregates {
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub context_precision: f64,
    pub context_recall: f64,
    pub overall: f64,
    pub total: usize,
}

/// Fraction of the answer's words that the retrieved context supports,
/// minus a penalty for file citations the context never mentions.
pub fn faithfulness(answer: &str, contexts: &[String]) -> f64 {
    if answer.is_empty() || contexts.is_empty() {
        return 0.0;
    }
    let answer_words: HashSet<String> = tokenize(answer).into_iter().collect();
    if answer_words.is_empty() {
        return 0.0;
    }
    let context_words: HashSet<String> = contexts.iter().flat_map(|c| tokenize(c)).collect();
    let supported = answer_words.intersection(&context_words).count();
    let base = supported as f64 / answer_words.len() as f64;
    (base - false_citation_penalty(answer, contexts)).clamp(0.0, 1.0)
}

/// Coverage of the query's content words in the answer, damped by a
/// length score that penalizes one-liners and rambling.
pub fn answer_relevancy(query: &str, answer: &str) -> f64 {
    if query.is_empty() || answer.is_empty() {
        return 0.0;
    }
    // An honest refusal scores flat, above hallucination and below a hit.
    if REFUSAL_RE.is_match(&answer.to_lowercase()) {
        return 0.3;
    }
    let terms = key_terms(query);
    let answer_words: HashSet<String> = tokenize(answer).into_iter().collect();
    let coverage = if terms.is_empty() {
        0.5
    } else {
        let hits = terms.iter().filter(|t| answer_words.contains(*t)).count();
        hits as f64 / terms.len() as f64
    };
    (coverage * 0.7 + length_score(answer) * 0.3).min(1.0)
}

/// Share of retrieved contexts that look relevant to the query; a context
/// counts when it holds at least half the query's content words, plus a
/// half credit when it covers the ground truth.
pub fn context_precision(query: &str, contexts: &[String], ground_truth: Option<&str>) -> f64 {
    if contexts.is_empty() {
        return 0.0;
    }
    let terms = key_terms(query);
    let mut relevant = 0.0;
    for context in contexts {
        let words: HashSet<String> = tokenize(context).into_iter().collect();
        let matched = terms.iter().filter(|t| words.contains(*t)).count();
        if matched as f64 >= terms.len() as f64 / 2.0 {
            relevant += 1.0;
        }
        if let Some(truth) = ground_truth {
            if covers_majority(&words, truth) {
                relevant += 0.5;
            }
        }
    }
    (relevant / contexts.len() as f64).min(1.0)
}

/// Fraction of the ground truth's content words present anywhere in the
/// retrieved contexts.
pub fn context_recall(contexts: &[String], ground_truth: &str) -> f64 {
    if ground_truth.is_empty() || contexts.is_empty() {
        return 0.0;
    }
    let gt_terms: HashSet<String> = key_terms(ground_truth).into_iter().collect();
    if gt_terms.is_empty() {
        return 1.0;
    }
    let context_words: HashSet<String> = contexts.iter().flat_map(|c| tokenize(c)).collect();
    let found = gt_terms.iter().filter(|t| context_words.contains(*t)).count();
    found as f64 / gt_terms.len() as f64
}

pub fn evaluate(sample: &EvalSample) -> EvalResult {
    let truth = sample.ground_truth.as_deref();
    EvalResult {
        query: sample.query.clone(),
        faithfulness: faithfulness(&sample.answer, &sample.contexts),
        answer_relevancy: answer_relevancy(&sample.query, &sample.answer),
        context_precision: context_precision(&sample.query, &sample.contexts, truth),
        // Neutral when there is no ground truth to recall against.
        context_recall: match truth {
            Some(truth) => context_recall(&sample.contexts, truth),
            None => 0.5,
        },
    }
}

pub fn evaluate_batch(samples: &[EvalSample]) -> (Vec<EvalResult>, Aggregates) {
    let results: Vec<EvalResult> = samples.iter().map(evaluate).collect();
    if results.is_empty() {
        return (results, Aggregates::default());
    }
    let mut agg = Aggregates {
        total: results.len(),
        ..Aggregates::default()
    };
    for result in &results {
        agg.faithfulness += result.faithfulness;
        agg.answer_relevancy += result.answer_relevancy;
        agg.context_precision += result.context_precision;
        agg.context_recall += result.context_recall;
        agg.overall += result.overall();
    }
    let n = results.len() as f64;
    agg.faithfulness /= n;
    agg.answer_relevancy /= n;
    agg.context_precision /= n;
    agg.context_recall /= n;
    agg.overall /= n;
    (results, agg)
}

fn key_terms(text: &str) -> Vec<String> {
    let stop: HashSet<&str> = EVAL_STOP_WORDS.iter().copied().collect();
    tokenize(text)
        .into_iter()
        .filter(|t| t.len() > 2 && !stop.contains(t.as_str()))
        .collect()
}

fn length_score(answer: &str) -> f64 {
    let words = tokenize(answer).len();
    if words < 10 {
        0.3
    } else if words > 500 {
        0.7
    } else {
        1.0
    }
}

fn false_citation_penalty(answer: &str, contexts: &[String]) -> f64 {
    let cited: HashSet<String> = FILE_CITE_RE
        .find_iter(answer)
        .map(|m| m.as_str().to_string())
        .collect();
    if cited.is_empty() {
        return 0.0;
    }
    let context_text = contexts.join(" ");
    let known: HashSet<String> = FILE_CITE_RE
        .find_iter(&context_text)
        .map(|m| m.as_str().to_string())
        .collect();
    let false_count = cited.difference(&known).count();
    false_count as f64 / cited.len() as f64 * 0.3
}

fn covers_majority(context_words: &HashSet<String>, truth: &str) -> bool {
    let gt_terms = key_terms(truth);
    let matched = gt_terms.iter().filter(|t| context_words.contains(*t)).count();
    matched as f64 >= gt_terms.len() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contexts(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_fully_supported_answer_is_faithful() {
        let score = faithfulness(
            "the parser reads tokens",
            &contexts(&["the parser reads tokens from the lexer"]),
        );
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_uncited_file_reference_is_penalized() {
        let ctx = contexts(&["the parser reads tokens"]);
        let plain = faithfulness("The parser reads tokens here", &ctx);
        let cited = faithfulness("The parser reads tokens, see parser.py", &ctx);
        assert!(cited < plain);
    }

    #[test]
    fn test_empty_inputs_score_zero_faithfulness() {
        assert_eq!(faithfulness("", &contexts(&["something"])), 0.0);
        assert_eq!(faithfulness("an answer", &[]), 0.0);
    }

    #[test]
    fn test_refusal_relevancy_is_flat() {
        let score = answer_relevancy("where is the parser", "I don't know the answer to that.");
        assert_eq!(score, 0.3);
    }

    #[test]
    fn test_relevancy_rewards_term_coverage() {
        let score = answer_relevancy(
            "how does the parser handle comments",
            "The parser strips comments before tokenization so the grammar can handle code only.",
        );
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_answer_takes_length_penalty() {
        // Full term coverage but under ten words: 0.7 + 0.3 * 0.3.
        let score = answer_relevancy("parser comments", "parser comments");
        assert!((score - 0.79).abs() < 1e-9);
    }

    #[test]
    fn test_precision_counts_relevant_contexts() {
        let score = context_precision(
            "parser comments",
            &contexts(&["the parser strips comments", "unrelated database text"]),
            None,
        );
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_precision_credits_ground_truth_coverage() {
        let ctx = contexts(&["the parser module", "unrelated database text"]);
        let without = context_precision("parser", &ctx, None);
        let with = context_precision("parser", &ctx, Some("the parser module strips comments"));
        assert!(with > without);
    }

    #[test]
    fn test_recall_is_term_fraction() {
        let score = context_recall(
            &contexts(&["the parser strips whitespace"]),
            "parser strips comments early",
        );
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_overall_weights_generation_over_retrieval() {
        let result = EvalResult {
            query: "q".to_string(),
            faithfulness: 1.0,
            answer_relevancy: 1.0,
            context_precision: 0.5,
            context_recall: 0.5,
        };
        assert!((result.overall() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_without_ground_truth_is_neutral_on_recall() {
        let sample = EvalSample {
            query: "where is the parser".to_string(),
            answer: "The parser lives in parser.py".to_string(),
            contexts: contexts(&["parser.py holds the parser"]),
            ground_truth: None,
        };
        let result = evaluate(&sample);
        assert_eq!(result.context_recall, 0.5);
    }

    #[test]
    fn test_evaluate_batch_averages() {
        let sample = EvalSample {
            query: "where is the parser".to_string(),
            answer: "The parser lives in parser.py next to the lexer and token tables.".to_string(),
            contexts: contexts(&["parser.py holds the parser next to the lexer token tables"]),
            ground_truth: Some("the parser lives in parser.py".to_string()),
        };
        let (results, agg) = evaluate_batch(std::slice::from_ref(&sample));
        assert_eq!(agg.total, 1);
        assert!((agg.overall - results[0].overall()).abs() < 1e-9);

        let (empty, agg) = evaluate_batch(&[]);
        assert!(empty.is_empty());
        assert_eq!(agg.total, 0);
    }
}
