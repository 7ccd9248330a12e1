//! Answer confidence scoring.
//!
//! A cheap heuristic stands in for a judge model: refusals floor out
//! immediately, citations earn a fixed bonus, and the rest of the score is
//! the fraction of the question's content words that appear among the
//! answer's words.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::QuarryConfig;
use crate::index::tokenizer::tokenize;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[Source \d+\]|\[\d+\]").unwrap()
});

const REFUSAL_PHRASES: &[&str] = &[
    "cannot find",
    "don't have",
    "not in the context",
    "no information",
    "unable to",
    "not enough",
];

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "how", "what", "where", "when",
];

/// Score an answer against its question, in `[0, 1]`.
pub fn score_answer(question: &str, answer: &str, config: &QuarryConfig) -> f64 {
    let lowered = answer.to_lowercase();
    if REFUSAL_PHRASES.iter().any(|p| lowered.contains(p)) {
        return config.low_confidence_floor;
    }

    let bonus = if CITATION_RE.is_match(answer) {
        config.citation_bonus
    } else {
        0.0
    };

    // Whole-word overlap: a question term only counts when it appears as a
    // word of the answer, not as a substring of some longer word.
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let question_terms: HashSet<String> = tokenize(question)
        .into_iter()
        .filter(|t| !stop.contains(t.as_str()))
        .collect();
    let overlap = if question_terms.is_empty() {
        0.5
    } else {
        let answer_words: HashSet<String> = tokenize(answer).into_iter().collect();
        let echoed = question_terms.intersection(&answer_words).count();
        echoed as f64 / question_terms.len() as f64
    };

    (bonus + overlap * config.overlap_weight).clamp(0.0, 1.0)
}
