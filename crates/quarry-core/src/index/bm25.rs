//! BM25 (Okapi variant) scoring over a tokenized corpus.
//!
//! Term statistics are computed once at build time; scoring a query touches
//! every document, which is fine for the in-memory corpus sizes this store
//! targets. Negative IDF values are floored to `epsilon * average_idf` so
//! very common terms still contribute a small positive weight.

use std::collections::HashMap;

const K1: f64 = 1.5;
const B: f64 = 0.75;
const EPSILON: f64 = 0.25;

#[derive(Debug, Clone)]
pub struct Bm25Index {
    /// Per-document term frequencies.
    doc_term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl Bm25Index {
    pub fn build(corpus: &[Vec<String>]) -> Self {
        let mut doc_term_freqs = Vec::with_capacity(corpus.len());
        let mut doc_lens = Vec::with_capacity(corpus.len());
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for tokens in corpus {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            doc_lens.push(tokens.len());
            doc_term_freqs.push(freqs);
        }

        let corpus_len = corpus.len();
        let avg_doc_len = if corpus_len == 0 {
            0.0
        } else {
            doc_lens.iter().sum::<usize>() as f64 / corpus_len as f64
        };

        // Raw IDF first, then floor negatives at epsilon * average_idf.
        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative_terms: Vec<String> = Vec::new();
        for (term, df) in &doc_freq {
            let value = ((corpus_len as f64 - *df as f64 + 0.5) / (*df as f64 + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative_terms.push(term.clone());
            }
            idf.insert(term.clone(), value);
        }
        if !idf.is_empty() {
            let average_idf = idf_sum / idf.len() as f64;
            let floor = EPSILON * average_idf;
            for term in negative_terms {
                idf.insert(term, floor);
            }
        }

        Self {
            doc_term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_term_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_term_freqs.is_empty()
    }

    /// Score every document for the given query tokens.
    pub fn scores(&self, query_tokens: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0; self.doc_term_freqs.len()];
        if self.avg_doc_len == 0.0 {
            return scores;
        }
        for token in query_tokens {
            let idf = match self.idf.get(token) {
                Some(value) => *value,
                None => continue,
            };
            for (index, freqs) in self.doc_term_freqs.iter().enumerate() {
                let tf = match freqs.get(token) {
                    Some(count) => *count as f64,
                    None => continue,
                };
                let norm = K1 * (1.0 - B + B * self.doc_lens[index] as f64 / self.avg_doc_len);
                scores[index] += idf * tf * (K1 + 1.0) / (tf + norm);
            }
        }
        scores
    }

    /// Indices of the top `k` documents by descending score, ties broken by
    /// lower index for determinism. Documents scoring zero are skipped.
    pub fn top_k(&self, query_tokens: &[String], k: usize) -> Vec<(usize, f64)> {
        let scores = self.scores(query_tokens);
        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}
