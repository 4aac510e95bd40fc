//! Document quality scorers.

pub mod heuristic;

pub use heuristic::HeuristicQualityScorer;
