//! Offline evaluation: golden query sets and heuristic quality metrics.

pub mod golden;
pub mod metrics;

pub use golden::{GoldenQuery, GoldenSet};
pub use metrics::{evaluate, evaluate_batch, EvalResult, EvalSample};
