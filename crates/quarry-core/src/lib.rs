//! Quarry core library — retrieval and question answering over a codebase.
//!
//! This crate indexes a repository into searchable fragments, links Python
//! entities into a call and inheritance graph, fuses lexical and semantic
//! rankings into one hit list, and drives a confidence-gated answer loop
//! with at most one refinement pass. Model backends (embedding, reranking,
//! completion) plug in through traits; a build without the `fastembed`
//! feature runs fully offline on the lexical index alone.

pub mod config;
pub mod errors;
pub mod eval;
pub mod graph;
pub mod guards;
pub mod hash;
pub mod index;
pub mod models;
pub mod qa;
pub mod retrieve;

pub use config::QuarryConfig;
pub use errors::{QuarryError, QuarryResult};
pub use eval::{EvalResult, EvalSample, GoldenSet};
pub use graph::CodeGraph;
pub use index::{build_index, default_sources, FragmentSource, FragmentStore};
pub use models::{Entity, Fragment, Relation, ScoredFragment};
pub use qa::{LanguageModel, Orchestrator, QueryOutcome};
pub use retrieve::{
    CachedRetriever, GraphEnhancedRetriever, HybridRetriever, RerankModel, Retriever,
};
