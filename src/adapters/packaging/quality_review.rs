//! Scores every produced document and writes a review report.

use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use tracing::warn;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Artifact, DocumentType, QualityReport};
use crate::domain::ports::{PackagingContext, PackagingStep, QualityScorer};

/// Writes `quality_review`: the average overall score, a per-document
/// table and the missing sections of each document.
pub struct QualityReviewStep {
    scorer: Arc<dyn QualityScorer>,
}

impl QualityReviewStep {
    pub fn new(scorer: Arc<dyn QualityScorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl PackagingStep for QualityReviewStep {
    fn name(&self) -> &'static str {
        "quality_review"
    }

    async fn run(&self, context: &PackagingContext) -> WorkflowResult<Vec<Artifact>> {
        if context.artifacts.is_empty() {
            return Err(WorkflowError::Packaging {
                step: self.name().to_string(),
                reason: "no documents to review".to_string(),
            });
        }

        let mut reports: Vec<(DocumentType, QualityReport)> = Vec::new();
        for artifact in context.artifacts.values() {
            match self.scorer.score(&artifact.content, artifact.output_type) {
                Ok(report) => reports.push((artifact.output_type, report)),
                Err(err) => warn!(
                    output_type = %artifact.output_type,
                    error = %err,
                    "Skipping document in quality review"
                ),
            }
        }
        if reports.is_empty() {
            return Err(WorkflowError::Packaging {
                step: self.name().to_string(),
                reason: "every document failed scoring".to_string(),
            });
        }

        let average =
            reports.iter().map(|(_, r)| r.overall_score).sum::<f64>() / reports.len() as f64;
        let passing = reports.iter().filter(|(_, r)| r.passed).count();

        let mut out = format!(
            "# Quality Review\n\n## Summary\n\n\
             Average overall score: {average:.1}/100. \
             {passing} of {} documents passed every check.\n\n\
             ## Scores\n\n| Document | Score | Words | Readability | Passed |\n|---|---|---|---|---|\n",
            reports.len()
        );
        for (doc_type, report) in &reports {
            let _ = writeln!(
                out,
                "| {} | {:.1} | {} | {:.1} | {} |",
                doc_type.display_name(),
                report.overall_score,
                report.detail.word_count.count,
                report.detail.readability.score,
                if report.passed { "yes" } else { "no" }
            );
        }

        let gaps: Vec<_> = reports
            .iter()
            .filter(|(_, r)| !r.detail.sections.missing.is_empty())
            .collect();
        if !gaps.is_empty() {
            out.push_str("\n## Missing Sections\n\n");
            for (doc_type, report) in gaps {
                let _ = writeln!(
                    out,
                    "- {}: {}",
                    doc_type.display_name(),
                    report.detail.sections.missing.join(", ")
                );
            }
        }

        Ok(vec![Artifact::new(DocumentType::QualityReview, out).with_quality_score(average)])
    }
}
