//! Builds a markdown index of every produced document.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::domain::errors::WorkflowResult;
use crate::domain::models::{Artifact, DocumentLevel, DocumentType};
use crate::domain::ports::{PackagingContext, PackagingStep};

/// Writes `document_index`: documents grouped by level with word counts
/// and quality scores, followed by the documents that were not produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentIndexStep;

impl DocumentIndexStep {
    pub const fn new() -> Self {
        Self
    }

    fn render(context: &PackagingContext) -> String {
        let mut by_level: BTreeMap<DocumentLevel, Vec<&Artifact>> = BTreeMap::new();
        for artifact in context.artifacts.values() {
            by_level
                .entry(artifact.output_type.level())
                .or_default()
                .push(artifact);
        }

        let mut out = format!(
            "# Documentation Index\n\n\
             ## Overview\n\n\
             Project `{}` ({} profile). {} documents were generated for this idea:\n\n> {}\n\n",
            context.project_id,
            context.profile,
            context.artifacts.len(),
            context.user_idea.trim()
        );

        for (level, artifacts) in &by_level {
            let _ = write!(
                out,
                "## {}\n\n| Document | Words | Quality | Revision |\n|---|---|---|---|\n",
                level.display_name()
            );
            for artifact in artifacts {
                let quality = artifact
                    .quality_score
                    .map_or_else(|| "n/a".to_string(), |s| format!("{s:.1}"));
                let _ = writeln!(
                    out,
                    "| {} (`{}`) | {} | {} | v{} |",
                    artifact.output_type.display_name(),
                    artifact.output_type,
                    artifact.word_count(),
                    quality,
                    artifact.revision + 1
                );
            }
            out.push('\n');
        }

        if !context.missing.is_empty() {
            out.push_str("## Not Generated\n\n");
            for doc_type in &context.missing {
                let _ = writeln!(out, "- {} (`{doc_type}`)", doc_type.display_name());
            }
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl PackagingStep for DocumentIndexStep {
    fn name(&self) -> &'static str {
        "document_index"
    }

    async fn run(&self, context: &PackagingContext) -> WorkflowResult<Vec<Artifact>> {
        Ok(vec![Artifact::new(
            DocumentType::DocumentIndex,
            Self::render(context),
        )])
    }
}
