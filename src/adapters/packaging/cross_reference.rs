//! Links every produced document to the documents it builds on and the
//! documents built on it.

use async_trait::async_trait;
use std::fmt::Write;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Artifact, DocumentType};
use crate::domain::ports::{PackagingContext, PackagingStep};

const RELATED_HEADING: &str = "## Related Documents";

/// Appends a `Related Documents` section to each produced document and
/// returns the rewritten documents. Documents that already carry the
/// section, or have no produced neighbours, are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossReferenceStep;

impl CrossReferenceStep {
    pub const fn new() -> Self {
        Self
    }

    fn builds_on(context: &PackagingContext, doc_type: DocumentType) -> Vec<DocumentType> {
        context
            .dependencies
            .get(&doc_type)
            .into_iter()
            .flatten()
            .filter(|dep| context.artifacts.contains_key(dep))
            .copied()
            .collect()
    }

    fn built_on_by(context: &PackagingContext, doc_type: DocumentType) -> Vec<DocumentType> {
        context
            .dependencies
            .iter()
            .filter(|(dependent, deps)| {
                deps.contains(&doc_type) && context.artifacts.contains_key(dependent)
            })
            .map(|(dependent, _)| *dependent)
            .collect()
    }

    fn link(
        artifact: &Artifact,
        builds_on: &[DocumentType],
        used_by: &[DocumentType],
    ) -> Option<Artifact> {
        if artifact.content.contains(RELATED_HEADING)
            || (builds_on.is_empty() && used_by.is_empty())
        {
            return None;
        }

        let mut content = artifact.content.trim_end().to_string();
        let _ = write!(content, "\n\n---\n\n{RELATED_HEADING}\n\n");
        for (label, types) in [("Builds on", builds_on), ("Referenced by", used_by)] {
            if types.is_empty() {
                continue;
            }
            let _ = writeln!(content, "{label}:\n");
            for doc_type in types {
                let _ = writeln!(content, "- {} (`{doc_type}`)", doc_type.display_name());
            }
            content.push('\n');
        }

        Some(Artifact {
            content: content.trim_end().to_string(),
            ..artifact.clone()
        })
    }
}

#[async_trait]
impl PackagingStep for CrossReferenceStep {
    fn name(&self) -> &'static str {
        "cross_references"
    }

    async fn run(&self, context: &PackagingContext) -> WorkflowResult<Vec<Artifact>> {
        if context.artifacts.is_empty() {
            return Err(WorkflowError::Packaging {
                step: self.name().to_string(),
                reason: "no documents to link".to_string(),
            });
        }

        Ok(context
            .artifacts
            .values()
            .filter_map(|artifact| {
                Self::link(
                    artifact,
                    &Self::builds_on(context, artifact.output_type),
                    &Self::built_on_by(context, artifact.output_type),
                )
            })
            .collect())
    }
}
