//! Quality scorer port.

use crate::domain::errors::WorkflowResult;
use crate::domain::models::{DocumentType, QualityReport};

/// Scores a document against the expectations for its type.
///
/// Scoring is CPU-bound and synchronous; implementations must not block on I/O.
pub trait QualityScorer: Send + Sync {
    fn score(&self, content: &str, document_type: DocumentType) -> WorkflowResult<QualityReport>;
}
