//! Retrieval pipeline: hybrid fusion, graph expansion, caching.

pub mod cache;
pub mod fusion;
pub mod graph_enhanced;

pub use cache::CachedRetriever;
pub use fusion::{HybridRetriever, RerankModel, Retriever};
pub use graph_enhanced::GraphEnhancedRetriever;
