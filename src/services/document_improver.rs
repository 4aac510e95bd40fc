//! Produces a revised document from a first pass and its quality feedback.

use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Artifact, QualityReport};
use crate::domain::ports::{GenerationOptions, GenerationService};

const IMPROVER_SYSTEM_PROMPT: &str = "You are a documentation improvement specialist. \
Rewrite documents so they address every issue in the review while keeping their structure and style.";

const IMPROVER_TEMPERATURE: f32 = 0.5;

/// Calls the generation service to revise a document once.
#[derive(Clone)]
pub struct DocumentImprover {
    generation: Arc<dyn GenerationService>,
    model: Option<String>,
    max_tokens: Option<u32>,
}

impl DocumentImprover {
    pub fn new(generation: Arc<dyn GenerationService>) -> Self {
        Self {
            generation,
            model: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Revise `original`. `report` is `None` when scoring failed, in which
    /// case generic feedback is used.
    pub async fn improve(
        &self,
        original: Artifact,
        report: Option<QualityReport>,
        score: f64,
        threshold: f64,
    ) -> WorkflowResult<Artifact> {
        let feedback = report.map_or_else(
            || fallback_feedback(score, threshold),
            |r| r.feedback(),
        );
        let prompt = improvement_prompt(&original, &feedback);

        let options = GenerationOptions {
            system: Some(IMPROVER_SYSTEM_PROMPT.to_string()),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(IMPROVER_TEMPERATURE),
            label: format!("{}:improve", original.output_type),
        };

        debug!(
            output_type = %original.output_type,
            original_chars = original.content.len(),
            "Requesting improved document"
        );
        let text = self
            .generation
            .generate(&prompt, &options)
            .await
            .map_err(|e| WorkflowError::ImprovementFailed(e.to_string()))?;

        let content = strip_code_fence(&text);
        if content.is_empty() {
            return Err(WorkflowError::ImprovementFailed(
                "generation returned an empty document".to_string(),
            ));
        }

        Ok(Artifact::new(original.output_type, content).revised())
    }
}

fn fallback_feedback(score: f64, threshold: f64) -> String {
    format!(
        "Current score: {score:.1}/100 (threshold {threshold:.1})\n\
         - Document quality is below the required threshold.\n\
         - Ensure all required sections are present and well developed.\n\
         - Improve completeness, clarity and structure; add detailed explanations."
    )
}

fn improvement_prompt(original: &Artifact, feedback: &str) -> String {
    format!(
        "Improve the following {name} so that it addresses every issue in the quality review.\n\
         Return the complete document with no truncated sections and no preamble.\n\n\
         === ORIGINAL DOCUMENT ({name}) ===\n\n{content}\n\n\
         === QUALITY REVIEW ===\n\n{feedback}\n",
        name = original.output_type.display_name(),
        content = original.content,
    )
}

/// Remove a wrapping markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    if lines.len() <= 2 {
        return String::new();
    }
    let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
        lines.len() - 1
    } else {
        lines.len()
    };
    lines[1..end].join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::generation::MockGenerationService;
    use crate::domain::models::DocumentType;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```markdown\n# Doc\nbody\n```"), "# Doc\nbody");
        assert_eq!(strip_code_fence("  # Doc  "), "# Doc");
        assert_eq!(strip_code_fence("```\n```"), "");
    }

    #[tokio::test]
    async fn test_improve_tags_revision_and_uses_fallback_feedback() {
        let mock = Arc::new(MockGenerationService::new());
        mock.set_response("requirements:improve", "# Improved\nbetter");
        let improver = DocumentImprover::new(mock.clone());

        let v1 = Artifact::new(DocumentType::Requirements, "# Draft");
        let v2 = improver.improve(v1, None, 0.0, 80.0).await.unwrap();

        assert_eq!(v2.revision, 1);
        assert_eq!(v2.content, "# Improved\nbetter");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("below the required threshold"));
        assert!(calls[0].prompt.contains("# Draft"));
    }

    #[tokio::test]
    async fn test_improve_failure_is_reported() {
        let mock = Arc::new(MockGenerationService::new());
        mock.fail_label("requirements:improve", "provider down");
        let improver = DocumentImprover::new(mock);

        let v1 = Artifact::new(DocumentType::Requirements, "# Draft");
        let err = improver.improve(v1, None, 10.0, 80.0).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ImprovementFailed(_)));
    }
}
