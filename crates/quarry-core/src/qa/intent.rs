//! Lightweight keyword routing of incoming questions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    Code,
    Data,
    Docs,
    Math,
    General,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::Code => "code",
            QueryIntent::Data => "data",
            QueryIntent::Docs => "docs",
            QueryIntent::Math => "math",
            QueryIntent::General => "general",
        }
    }
}

const CODE_KEYWORDS: &[&str] = &[
    "function",
    "class",
    "method",
    "implement",
    "call",
    "import",
    "module",
    "bug",
    "error",
    "code",
    "api",
    "return",
];

const DATA_KEYWORDS: &[&str] = &[
    "csv",
    "table",
    "column",
    "row",
    "dataset",
    "schema",
    "json",
    "field",
];

const DOCS_KEYWORDS: &[&str] = &[
    "documentation",
    "readme",
    "guide",
    "tutorial",
    "install",
    "setup",
    "configure",
    "usage",
];

const MATH_KEYWORDS: &[&str] = &[
    "equation",
    "formula",
    "theorem",
    "proof",
    "derivative",
    "integral",
    "matrix",
];

/// Keyword-count vote over the question. Ties break toward code, then math,
/// then data, then docs; a question matching nothing is general.
pub fn classify(question: &str) -> QueryIntent {
    let lowered = question.to_lowercase();
    let count = |keywords: &[&str]| keywords.iter().filter(|kw| lowered.contains(*kw)).count();
    let ranked = [
        (QueryIntent::Code, count(CODE_KEYWORDS)),
        (QueryIntent::Math, count(MATH_KEYWORDS)),
        (QueryIntent::Data, count(DATA_KEYWORDS)),
        (QueryIntent::Docs, count(DOCS_KEYWORDS)),
    ];
    let mut best = (QueryIntent::General, 0usize);
    for (intent, score) in ranked {
        if score > best.1 {
            best = (intent, score);
        }
    }
    best.0
}
