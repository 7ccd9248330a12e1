//! Knowledge graph over code entities: extraction, linking, traversal.

pub mod code_graph;
pub mod extract;

pub use code_graph::CodeGraph;
