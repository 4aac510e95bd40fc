//! Port trait definitions (Hexagonal Architecture)
//!
//! These traits define the contracts that adapters implement:
//! - GenerationService: text generation backends
//! - QualityScorer: document scoring
//! - ArtifactStore: persistence of artifacts and runs
//! - PackagingStep: phase-3 post-processing

pub mod artifact_store;
pub mod generation;
pub mod packaging;
pub mod quality_scorer;

pub use artifact_store::ArtifactStore;
pub use generation::{GenerationError, GenerationOptions, GenerationService};
pub use packaging::{PackagingContext, PackagingStep};
pub use quality_scorer::QualityScorer;
