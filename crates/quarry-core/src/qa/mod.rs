//! Question answering: intent routing, confidence scoring, the refinement
//! loop.

pub mod confidence;
pub mod intent;
pub mod orchestrator;
pub mod refine;

pub use intent::QueryIntent;
pub use orchestrator::{LanguageModel, LoopState, Orchestrator, QueryOutcome};
