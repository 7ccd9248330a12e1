//! Index construction: file scanning, fragment extraction, lexical and
//! semantic ranking, persistence.

pub mod bm25;
pub mod manifest;
pub mod sources;
pub mod store;
pub mod tokenizer;
pub mod vector;

pub use sources::{build_index, default_sources, FragmentSource, IndexReport};
pub use store::FragmentStore;
