//! Consolidates the produced documents into one developer brief.

use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Artifact, DocumentType, QualityRequirements};
use crate::domain::ports::{GenerationOptions, GenerationService, PackagingContext, PackagingStep};

const BRIEF_SYSTEM_PROMPT: &str = "You are a senior engineer writing the single file a coding \
assistant reads before working on a project. Be concrete: commands, file layout, data models, \
endpoints and conventions. Use Markdown and never truncate a section.";

/// Writes `developer_brief`: one generated document that condenses every
/// produced document for a coding assistant.
pub struct DeveloperBriefStep {
    generation: Arc<dyn GenerationService>,
    model: Option<String>,
    max_tokens: Option<u32>,
}

impl DeveloperBriefStep {
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

    fn prompt(context: &PackagingContext) -> String {
        let mut prompt = format!(
            "Project idea:\n\n{}\n\nAll available documentation:\n\n",
            context.user_idea.trim()
        );
        for artifact in context.artifacts.values() {
            let _ = write!(
                prompt,
                "## {}\n\n{}\n\n",
                artifact.output_type.display_name(),
                artifact.content.trim()
            );
        }
        let sections = QualityRequirements::for_type(DocumentType::DeveloperBrief).section_labels();
        let _ = write!(
            prompt,
            "Write the {} from the documentation above. Include these sections as headings: {}.",
            DocumentType::DeveloperBrief.display_name(),
            sections.join(", ")
        );
        prompt
    }
}

#[async_trait]
impl PackagingStep for DeveloperBriefStep {
    fn name(&self) -> &'static str {
        "developer_brief"
    }

    async fn run(&self, context: &PackagingContext) -> WorkflowResult<Vec<Artifact>> {
        let packaging_error = |reason: String| WorkflowError::Packaging {
            step: self.name().to_string(),
            reason,
        };
        if context.artifacts.is_empty() {
            return Err(packaging_error("no documents to condense".to_string()));
        }

        let options = GenerationOptions {
            system: Some(BRIEF_SYSTEM_PROMPT.to_string()),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: None,
            label: DocumentType::DeveloperBrief.as_str().to_string(),
        };
        let prompt = Self::prompt(context);
        debug!(
            documents = context.artifacts.len(),
            prompt_chars = prompt.len(),
            "Requesting developer brief"
        );

        let text = self
            .generation
            .generate(&prompt, &options)
            .await
            .map_err(|e| packaging_error(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(packaging_error("empty response".to_string()));
        }
        Ok(vec![Artifact::new(DocumentType::DeveloperBrief, text)])
    }
}
