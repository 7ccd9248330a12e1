//! Tokenization shared by the lexical corpus and the query side.
//!
//! Both sides must split identically or BM25 term statistics drift, so this
//! is the single tokenizer for the whole index layer.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

/// Split text into lowercase identifier-preserving tokens.
///
/// Splits on every non-alphanumeric, non-underscore character, so
/// `snake_case` survives as one token while `foo.bar(baz)` yields three.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Rough token-count estimate for context budgeting.
pub fn estimate_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    (text.len() as f64 / 3.5).max(1.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_preserves_identifiers() {
        let tokens = tokenize("HybridRetriever.retrieve(top_k_bm25)");
        assert_eq!(tokens, vec!["hybridretriever", "retrieve", "top_k_bm25"]);
    }

    #[test]
    fn test_tokenize_empty_and_symbols() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("+-*/ !?").is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens(&"x".repeat(35)), 10);
    }
}
