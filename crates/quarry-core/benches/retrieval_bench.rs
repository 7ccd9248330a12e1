//! Criterion benchmarks for quarry-core.
//!
//! All benchmarks run without model backends: the store is built lexical-only
//! and the graph benchmarks parse synthetic Python written to a temp
//! directory.
//!
//! ## Benchmark groups
//!
//! 1. **guards** — Input clamping / truncation.
//! 2. **tokenization** — Token splitting and size estimation.
//! 3. **lexical_search** — BM25 ranking at several corpus sizes.
//! 4. **fusion** — Full hybrid retrieve path (lexical-only store).
//! 5. **splitting** — Oversized fragment splitting.
//! 6. **graph** — Graph build, traversal, and context rendering.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/quarry-core/Cargo.toml
//! # Run only the fusion group:
//! cargo bench --manifest-path crates/quarry-core/Cargo.toml -- fusion
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use quarry_core::graph::CodeGraph;
use quarry_core::guards::{clamp_limit, truncate_query, MAX_RESULT_LIMIT};
use quarry_core::index::sources::split_fragments;
use quarry_core::index::store::FragmentStore;
use quarry_core::index::tokenizer::{estimate_tokens, tokenize};
use quarry_core::models::{Fragment, FragmentMetadata};
use quarry_core::retrieve::{HybridRetriever, Retriever};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const WORDS: &[&str] = &[
    "parser", "tokenizer", "index", "fragment", "graph", "entity", "query",
    "retriever", "module", "handler", "config", "schema", "cache", "worker",
    "builder", "stream", "buffer", "channel", "record", "cursor",
];

/// `n` synthetic fragments with overlapping but distinct vocabulary.
fn make_fragments(n: usize) -> Vec<Fragment> {
    (0..n)
        .map(|i| {
            let text: String = (0..30)
                .map(|j| WORDS[(i * 7 + j * 3) % WORDS.len()])
                .collect::<Vec<_>>()
                .join(" ");
            Fragment {
                id: format!("frag_{i}"),
                text,
                metadata: FragmentMetadata {
                    source_type: "text".to_string(),
                    path: format!("docs/note_{i}.md"),
                    start_line: Some(1),
                    end_line: Some(3),
                    ..Default::default()
                },
            }
        })
        .collect()
}

fn make_store(n: usize) -> Arc<FragmentStore> {
    Arc::new(FragmentStore::build(make_fragments(n), None).unwrap())
}

/// Write `n` Python files into a temp dir, each defining a handful of
/// functions with calls chaining into the next file.
fn make_python_repo(n: usize) -> (tempfile::TempDir, Vec<String>) {
    let dir = tempfile::tempdir().unwrap();
    let mut rels = Vec::with_capacity(n);
    for i in 0..n {
        let next = (i + 1) % n;
        let source = format!(
            "def handler_{i}(payload):\n    \"\"\"Handle payload {i}.\"\"\"\n    return transform_{i}(payload)\n\n\
             def transform_{i}(payload):\n    handler_{next}(payload)\n\n\
             class Worker{i}:\n    def run(self):\n        handler_{i}(None)\n"
        );
        let rel = format!("mod_{i}.py");
        std::fs::write(dir.path().join(&rel), source).unwrap();
        rels.push(rel);
    }
    (dir, rels)
}

// ---------------------------------------------------------------------------
// Benchmark: Guard clamping functions
// ---------------------------------------------------------------------------

fn bench_guards(c: &mut Criterion) {
    let mut group = c.benchmark_group("guards");

    group.bench_function("clamp_limit", |b| {
        b.iter(|| clamp_limit(black_box(200), black_box(MAX_RESULT_LIMIT)));
    });

    group.bench_function("truncate_query_short", |b| {
        b.iter(|| truncate_query(black_box("where is the tokenizer defined")));
    });

    group.bench_function("truncate_query_long", |b| {
        let long_query = "identifier ".repeat(200);
        b.iter(|| truncate_query(black_box(&long_query)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Tokenization
// ---------------------------------------------------------------------------

fn bench_tokenization(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenization");

    group.bench_function("tokenize_short", |b| {
        b.iter(|| tokenize(black_box("def parse_module(source): return ast")));
    });

    let large_text =
        "fn process_data(input: &str) -> Result<Vec<u8>, Error> { todo!() }\n".repeat(500);
    group.bench_function("tokenize_large", |b| {
        b.iter(|| tokenize(black_box(&large_text)));
    });

    group.bench_function("estimate_tokens_large", |b| {
        b.iter(|| estimate_tokens(black_box(&large_text)));
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Lexical search at various corpus sizes
// ---------------------------------------------------------------------------

fn bench_lexical_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexical_search");

    for &n in &[100usize, 1000, 5000] {
        group.bench_with_input(BenchmarkId::new("search", n), &n, |b, &n| {
            let store = make_store(n);
            b.iter(|| {
                let hits = store.search_lexical(black_box("parser graph cache"), 12);
                black_box(hits);
            });
        });
    }

    group.bench_function("build_1000", |b| {
        b.iter(|| {
            let store = FragmentStore::build(make_fragments(1000), None).unwrap();
            black_box(store);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Hybrid fusion path
// ---------------------------------------------------------------------------

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");

    for &n in &[100usize, 1000] {
        group.bench_with_input(BenchmarkId::new("retrieve", n), &n, |b, &n| {
            let retriever = HybridRetriever::new(make_store(n));
            b.iter(|| {
                let hits = retriever
                    .retrieve(black_box("tokenizer fragment worker"), 12, 12, 8)
                    .unwrap();
                black_box(hits);
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Fragment splitting
// ---------------------------------------------------------------------------

fn bench_splitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("splitting");

    let big = Fragment {
        id: "big".to_string(),
        text: "some reasonably long line of source text\n".repeat(2000),
        metadata: FragmentMetadata::default(),
    };
    group.bench_function("split_80kb", |b| {
        b.iter(|| {
            let parts = split_fragments(vec![big.clone()], 3500, 250);
            black_box(parts);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmark: Graph build and traversal
// ---------------------------------------------------------------------------

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");
    group.sample_size(30);

    for &n in &[10usize, 50] {
        group.bench_with_input(BenchmarkId::new("build", n), &n, |b, &n| {
            let (dir, rels) = make_python_repo(n);
            b.iter(|| {
                let graph = CodeGraph::build(black_box(dir.path()), &rels);
                black_box(graph);
            });
        });
    }

    let (dir, rels) = make_python_repo(50);
    let graph = CodeGraph::build(dir.path(), &rels);

    group.bench_function("related_entities_two_hops", |b| {
        b.iter(|| {
            let related = graph.related_entities(black_box("mod_0.py:handler_0"), 2);
            black_box(related);
        });
    });

    group.bench_function("entity_context", |b| {
        b.iter(|| {
            let card = graph.entity_context(black_box("mod_0.py:transform_0"));
            black_box(card);
        });
    });

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_guards,
    bench_tokenization,
    bench_lexical_search,
    bench_fusion,
    bench_splitting,
    bench_graph,
);
criterion_main!(benches);
