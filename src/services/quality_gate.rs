//! Quality gate: score a first pass and revise it at most once.

use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Artifact, QualityReport};
use crate::domain::ports::QualityScorer;
use crate::services::document_improver::DocumentImprover;

/// Wrap a generation step with a single-revision quality check.
///
/// 1. `generate` produces V1; its error fails the task.
/// 2. `score` rates V1. A scoring error counts as score 0 with no report.
/// 3. At or above `threshold`, V1 is returned and `improve` is never called.
/// 4. Otherwise `improve` runs exactly once and its result (V2) is returned.
///    V2 is re-scored for the log only.
/// 5. If `improve` fails, V1 is returned.
pub async fn run_with_gate<G, GF, S, I, IF>(
    generate: G,
    score: S,
    improve: I,
    threshold: f64,
) -> WorkflowResult<Artifact>
where
    G: FnOnce() -> GF,
    GF: Future<Output = WorkflowResult<Artifact>>,
    S: Fn(&Artifact) -> WorkflowResult<QualityReport>,
    I: FnOnce(Artifact, Option<QualityReport>, f64) -> IF,
    IF: Future<Output = WorkflowResult<Artifact>>,
{
    let v1 = generate().await?;
    let output_type = v1.output_type;

    let (v1_score, report) = match score(&v1) {
        Ok(report) => (report.overall_score, Some(report)),
        Err(err) => {
            warn!(
                output_type = %output_type,
                error = %err,
                "Quality scoring failed, treating score as 0"
            );
            (0.0, None)
        }
    };

    if v1_score >= threshold {
        info!(
            output_type = %output_type,
            score = v1_score,
            threshold,
            "First pass meets quality threshold"
        );
        return Ok(v1.with_quality_score(v1_score));
    }

    warn!(
        output_type = %output_type,
        score = v1_score,
        threshold,
        "First pass below quality threshold, requesting one revision"
    );

    match improve(v1.clone(), report, v1_score).await {
        Ok(v2) => {
            let v2 = v2.revised();
            match score(&v2) {
                Ok(v2_report) => {
                    info!(
                        output_type = %output_type,
                        v1_score,
                        v2_score = v2_report.overall_score,
                        "Revision complete"
                    );
                    Ok(v2.with_quality_score(v2_report.overall_score))
                }
                Err(err) => {
                    warn!(output_type = %output_type, error = %err, "Re-scoring revision failed");
                    Ok(v2)
                }
            }
        }
        Err(err) => {
            warn!(
                output_type = %output_type,
                error = %err,
                "Revision failed, keeping first pass"
            );
            Ok(v1.with_quality_score(v1_score))
        }
    }
}

/// Binds a scorer and an improver so callers only supply the first pass.
#[derive(Clone)]
pub struct QualityGate {
    scorer: Arc<dyn QualityScorer>,
    improver: DocumentImprover,
}

impl QualityGate {
    pub fn new(scorer: Arc<dyn QualityScorer>, improver: DocumentImprover) -> Self {
        Self { scorer, improver }
    }

    pub async fn apply<G, GF>(&self, generate: G, threshold: f64) -> WorkflowResult<Artifact>
    where
        G: FnOnce() -> GF,
        GF: Future<Output = WorkflowResult<Artifact>>,
    {
        self.apply_until(generate, threshold, None).await
    }

    /// Like [`apply`](Self::apply), but a revision still running at
    /// `deadline` is abandoned and the first pass is kept.
    pub async fn apply_until<G, GF>(
        &self,
        generate: G,
        threshold: f64,
        deadline: Option<Instant>,
    ) -> WorkflowResult<Artifact>
    where
        G: FnOnce() -> GF,
        GF: Future<Output = WorkflowResult<Artifact>>,
    {
        run_with_gate(
            generate,
            |artifact| self.scorer.score(&artifact.content, artifact.output_type),
            |v1, report, score| async move {
                let revision = self.improver.improve(v1, report, score, threshold);
                match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, revision)
                        .await
                        .unwrap_or_else(|_| {
                            Err(WorkflowError::ImprovementFailed(
                                "revision did not finish before the task deadline".to_string(),
                            ))
                        }),
                    None => revision.await,
                }
            },
            threshold,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::WorkflowError;
    use crate::domain::models::quality::{
        QualityDetail, ReadabilityCheck, SectionCheck, WordCountCheck,
    };
    use crate::domain::models::DocumentType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report(score: f64) -> QualityReport {
        QualityReport {
            overall_score: score,
            passed: score >= 50.0,
            detail: QualityDetail {
                word_count: WordCountCheck {
                    count: 10,
                    minimum: 10,
                    passed: true,
                },
                sections: SectionCheck {
                    required: 0,
                    found: vec![],
                    missing: vec![],
                },
                readability: ReadabilityCheck {
                    score: 60.0,
                    minimum: 50.0,
                    passed: true,
                },
            },
        }
    }

    #[tokio::test]
    async fn test_passing_first_pass_skips_improver() {
        let improve_calls = AtomicUsize::new(0);
        let result = run_with_gate(
            || async { Ok(Artifact::new(DocumentType::Requirements, "v1")) },
            |_| Ok(report(91.0)),
            |v1, _, _| {
                improve_calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(v1) }
            },
            80.0,
        )
        .await
        .unwrap();

        assert_eq!(result.content, "v1");
        assert_eq!(result.revision, 0);
        assert_eq!(result.quality_score, Some(91.0));
        assert_eq!(improve_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_error_propagates() {
        let result = run_with_gate(
            || async { Err(WorkflowError::GenerationFailed("down".to_string())) },
            |_| Ok(report(100.0)),
            |v1, _, _| async move { Ok(v1) },
            80.0,
        )
        .await;
        assert!(matches!(result, Err(WorkflowError::GenerationFailed(_))));
    }

    #[tokio::test]
    async fn test_scorer_error_counts_as_zero() {
        let seen_score = std::sync::Mutex::new(None);
        let result = run_with_gate(
            || async { Ok(Artifact::new(DocumentType::UserStories, "v1")) },
            |_| Err(WorkflowError::ScoringFailed("broken".to_string())),
            |v1, report, score| {
                *seen_score.lock().unwrap() = Some((score, report.is_none()));
                async move { Ok(Artifact::new(v1.output_type, "v2")) }
            },
            75.0,
        )
        .await
        .unwrap();

        assert_eq!(*seen_score.lock().unwrap(), Some((0.0, true)));
        assert_eq!(result.content, "v2");
        assert_eq!(result.revision, 1);
        assert_eq!(result.quality_score, None);
    }

    #[tokio::test]
    async fn test_improver_failure_returns_first_pass() {
        let result = run_with_gate(
            || async { Ok(Artifact::new(DocumentType::DatabaseSchema, "v1")) },
            |_| Ok(report(20.0)),
            |_, _, _| async { Err(WorkflowError::ImprovementFailed("nope".to_string())) },
            70.0,
        )
        .await
        .unwrap();

        assert_eq!(result.content, "v1");
        assert_eq!(result.revision, 0);
        assert_eq!(result.quality_score, Some(20.0));
    }

    #[tokio::test]
    async fn test_revision_past_deadline_keeps_first_pass() {
        use crate::adapters::generation::mock::{generated_document, MockResponse};
        use crate::adapters::generation::MockGenerationService;
        use crate::adapters::quality::HeuristicQualityScorer;
        use std::time::Duration;

        let generation = Arc::new(MockGenerationService::new());
        generation.set_mock_response(
            "requirements:improve",
            MockResponse::success(generated_document("requirements"))
                .with_delay(Duration::from_secs(5)),
        );
        let gate = QualityGate::new(
            Arc::new(HeuristicQualityScorer::new()),
            DocumentImprover::new(generation.clone()),
        );

        let deadline = Instant::now() + Duration::from_millis(50);
        let result = gate
            .apply_until(
                || async { Ok(Artifact::new(DocumentType::Requirements, "# Requirements\n\nShort.")) },
                80.0,
                Some(deadline),
            )
            .await
            .unwrap();

        assert_eq!(result.revision, 0);
        assert_eq!(result.content, "# Requirements\n\nShort.");
        assert_eq!(generation.call_count("requirements:improve"), 1);
    }
}
