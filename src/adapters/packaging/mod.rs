//! Phase-3 packaging steps.

pub mod cross_reference;
pub mod developer_brief;
pub mod document_index;
pub mod quality_review;

pub use cross_reference::CrossReferenceStep;
pub use developer_brief::DeveloperBriefStep;
pub use document_index::DocumentIndexStep;
pub use quality_review::QualityReviewStep;
