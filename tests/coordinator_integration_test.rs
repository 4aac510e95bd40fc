//! End-to-end runs of the workflow coordinator over the mock backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Harness, IDEA};
use docsuite::adapters::generation::mock::{generated_document, MockResponse};
use docsuite::adapters::storage::SqliteArtifactStore;
use docsuite::domain::models::{Phase, TaskStatus};
use docsuite::domain::ports::{ArtifactStore, PackagingContext, PackagingStep};
use docsuite::services::{ExecutionEvent, WorkflowEvent};
use docsuite::{Artifact, DocumentType, Profile, RunStatus, WorkflowError, WorkflowResult};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_team_run_generates_every_document() {
    common::setup_test_logging();
    let harness = Harness::new();
    let run = harness
        .coordinator()
        .generate_all_docs_for("proj-team", IDEA, Profile::Team)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.phase_results.len(), 16);
    assert_eq!(run.task_statuses.len(), 16);
    assert!(run.failed_task_ids.is_empty());
    assert!(run.error.is_none());
    assert!(run.finished_at.is_some());
    assert_eq!(run.phases.len(), 3);
    assert!(run.packaging.iter().all(|o| o.success));

    // 16 documents plus the index and quality review
    assert_eq!(harness.store.artifact_count("proj-team").await, 18);
    let index = harness
        .store
        .get_artifact("proj-team", DocumentType::DocumentIndex)
        .await
        .unwrap()
        .unwrap();
    assert!(index.content.contains("API Documentation"));
    assert!(!index.content.contains("## Not Generated"));

    // Every gated first pass already meets its threshold.
    assert!(harness
        .generation
        .calls()
        .iter()
        .all(|c| !c.label.ends_with(":improve")));

    let stored = harness
        .coordinator()
        .get_status("proj-team")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert_eq!(stored.phase_results.len(), 16);
}

#[tokio::test]
async fn test_dependencies_reach_dependent_prompts() {
    let harness = Harness::new();
    harness
        .generation
        .set_response("requirements", requirements_with_marker());
    harness
        .bare_coordinator()
        .generate_all_docs_for("proj-ctx", IDEA, Profile::Individual)
        .await
        .unwrap();

    let calls = harness.generation.calls();
    let stories = calls.iter().find(|c| c.label == "user_stories").unwrap();
    assert!(stories.prompt.contains(IDEA));
    assert!(stories.prompt.contains("MARKER-REQ-42"));

    let requirements = calls.iter().find(|c| c.label == "requirements").unwrap();
    assert!(!requirements.prompt.contains("MARKER-REQ-42"));
}

fn requirements_with_marker() -> String {
    let mut doc = docsuite::adapters::generation::mock::generated_document("requirements");
    doc.push_str("\n\nTracking id MARKER-REQ-42 is kept for the team.\n");
    doc
}

#[tokio::test]
async fn test_individual_profile_skips_team_documents() {
    let harness = Harness::new();
    let run = harness
        .bare_coordinator()
        .generate_all_docs_for("proj-solo", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.phase_results.len(), 9);
    assert!(!run.phase_results.contains_key(&DocumentType::ProjectCharter));
    assert!(!run.phase_results.contains_key(&DocumentType::MarketingPlan));
    assert_eq!(harness.generation.call_count("project_charter"), 0);
}

#[tokio::test]
async fn test_root_failure_aborts_after_phase_one() {
    let harness = Harness::new();
    harness.generation.fail_label("requirements", "invalid api key");

    let run = harness
        .coordinator()
        .generate_all_docs_for("proj-abort", IDEA, Profile::Team)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Aborted);
    assert!(run.error.as_deref().unwrap().contains("requirements"));
    assert_eq!(run.phases.len(), 1);
    assert!(run.packaging.is_empty());
    assert!(run.phase_results.is_empty());

    assert_eq!(run.task_statuses["requirements"].status, TaskStatus::Failed);
    for id in [
        "project_charter",
        "user_stories",
        "technical_documentation",
        "database_schema",
    ] {
        assert_eq!(run.task_statuses[id].status, TaskStatus::Blocked, "{id}");
    }

    // Nothing past the root was requested.
    let labels: Vec<String> = harness
        .generation
        .calls()
        .into_iter()
        .map(|c| c.label)
        .collect();
    assert_eq!(labels, vec!["requirements".to_string()]);

    let err = run.ensure_not_aborted().unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::RootTaskFailed { ref task_id, .. } if task_id == "requirements"
    ));
    let message = err.to_string();
    assert_eq!(message.matches("Root task").count(), 1, "{message}");
    assert!(message.contains("invalid api key"));

    let stored = harness.store.get_run("proj-abort").await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Aborted);
}

#[tokio::test]
async fn test_secondary_failure_blocks_only_its_dependents() {
    let harness = Harness::new();
    harness
        .generation
        .fail_label("api_documentation", "content filtered");

    let run = harness
        .coordinator()
        .generate_all_docs_for("proj-partial", IDEA, Profile::Team)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::PartiallyCompleted);
    assert_eq!(
        run.task_statuses["api_documentation"].status,
        TaskStatus::Failed
    );
    for id in ["setup_guide", "developer_documentation"] {
        let execution = &run.task_statuses[id];
        assert_eq!(execution.status, TaskStatus::Blocked, "{id}");
        assert_eq!(execution.blocked_by, vec!["api_documentation".to_string()]);
    }
    assert_eq!(harness.generation.call_count("setup_guide"), 0);

    let mut failed = run.failed_task_ids.clone();
    failed.sort();
    assert_eq!(
        failed,
        vec![
            "api_documentation".to_string(),
            "developer_documentation".to_string(),
            "setup_guide".to_string(),
        ]
    );

    // 16 scheduled, 3 missing
    assert_eq!(run.phase_results.len(), 13);
    assert!(run.packaging.iter().all(|o| o.success));

    let index = harness
        .store
        .get_artifact("proj-partial", DocumentType::DocumentIndex)
        .await
        .unwrap()
        .unwrap();
    assert!(index.content.contains("## Not Generated"));
    assert!(index.content.contains("Setup Guide"));
}

#[tokio::test]
async fn test_non_root_phase_one_failure_preblocks_phase_two() {
    let harness = Harness::new();
    harness
        .generation
        .fail_label("project_charter", "provider down");

    let run = harness
        .bare_coordinator()
        .generate_all_docs_for("proj-charter", IDEA, Profile::Team)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::PartiallyCompleted);
    assert_eq!(
        run.task_statuses["user_stories"].status,
        TaskStatus::Blocked
    );

    // Phase-2 tasks that need a missing phase-1 document never call the backend.
    let pm = &run.task_statuses["pm_documentation"];
    assert_eq!(pm.status, TaskStatus::Blocked);
    assert_eq!(pm.blocked_by, vec!["project_charter".to_string()]);
    assert_eq!(harness.generation.call_count("pm_documentation"), 0);
    assert_eq!(
        run.task_statuses["stakeholder_communication"].status,
        TaskStatus::Blocked
    );

    // Every phase-2 task needs at least one blocked phase-1 document.
    assert!(run
        .phase_results
        .keys()
        .all(|t| *t == DocumentType::Requirements));
}

#[tokio::test]
async fn test_low_quality_first_pass_is_revised_once() {
    let harness = Harness::new();
    harness
        .generation
        .set_response("requirements", "# Requirements\nToo short to pass.");

    let run = harness
        .bare_coordinator()
        .generate_all_docs_for("proj-revise", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(harness.generation.call_count("requirements:improve"), 1);
    let requirements = &run.phase_results[&DocumentType::Requirements];
    assert_eq!(requirements.revision, 1);
    assert!(requirements.quality_score.unwrap() >= 80.0);

    let stored = harness
        .store
        .get_artifact("proj-revise", DocumentType::Requirements)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.revision, 1);
}

struct FailingStep;

#[async_trait]
impl PackagingStep for FailingStep {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn run(&self, _context: &PackagingContext) -> WorkflowResult<Vec<Artifact>> {
        Err(WorkflowError::Packaging {
            step: "failing".to_string(),
            reason: "template missing".to_string(),
        })
    }
}

struct PanickingStep;

#[async_trait]
impl PackagingStep for PanickingStep {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn run(&self, _context: &PackagingContext) -> WorkflowResult<Vec<Artifact>> {
        panic!("packaging exploded")
    }
}

#[tokio::test]
async fn test_packaging_failures_are_isolated() {
    let harness = Harness::new();
    let coordinator = harness
        .bare_coordinator()
        .with_packaging_step(Arc::new(FailingStep))
        .with_packaging_step(Arc::new(PanickingStep))
        .with_packaging_step(Arc::new(
            docsuite::adapters::packaging::DocumentIndexStep::new(),
        ));

    let run = coordinator
        .generate_all_docs_for("proj-pack", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.phase_results.len(), 9);
    assert_eq!(run.packaging.len(), 3);
    assert!(!run.packaging[0].success);
    assert!(run.packaging[0]
        .error
        .as_deref()
        .unwrap()
        .contains("template missing"));
    assert!(!run.packaging[1].success);
    assert!(run.packaging[2].success);
    assert_eq!(run.packaging[2].produced, vec![DocumentType::DocumentIndex]);

    let summary = run.phases.last().unwrap();
    assert_eq!(summary.phase, Phase::Packaging);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 2);
}

#[tokio::test]
async fn test_events_follow_phase_order() {
    let harness = Harness::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = harness.coordinator().with_events(tx);

    let run = coordinator
        .generate_all_docs_for("proj-events", IDEA, Profile::Team)
        .await
        .unwrap();
    drop(coordinator);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(
        events.first(),
        Some(&WorkflowEvent::PhaseStarted {
            phase: Phase::Foundational,
            task_count: 5
        })
    );
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::RunFinished {
            project_id: run.project_id.clone(),
            status: RunStatus::Completed
        })
    );

    let completed_phases: Vec<Phase> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::PhaseCompleted { summary } => Some(summary.phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        completed_phases,
        vec![Phase::Foundational, Phase::Secondary, Phase::Packaging]
    );

    let task_completions = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                WorkflowEvent::Task {
                    event: ExecutionEvent::TaskCompleted { .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(task_completions, 16);

    let packaging_steps = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::PackagingStep { .. }))
        .count();
    assert_eq!(packaging_steps, 2);
}

#[tokio::test]
async fn test_empty_idea_is_rejected() {
    let harness = Harness::new();
    let err = harness
        .coordinator()
        .generate_all_docs("   ", Profile::Team)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidInput(_)));
    assert!(harness.generation.calls().is_empty());
}

#[tokio::test]
async fn test_phase_concurrency_is_capped() {
    let generation = docsuite::adapters::generation::MockGenerationService::new()
        .with_delay(std::time::Duration::from_millis(15));
    let harness = Harness::with_generation(generation);
    let coordinator = harness.bare_coordinator().with_settings(
        docsuite::services::CoordinatorSettings {
            phase1_concurrency: 1,
            phase2_concurrency: 2,
            task_timeout: None,
        },
    );

    let run = coordinator
        .generate_all_docs_for("proj-cap", IDEA, Profile::Team)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert!(harness.generation.max_in_flight() <= 2);
}

#[tokio::test]
async fn test_sqlite_store_persists_run() {
    let dir = common::temp_dir();
    let db_path = dir.path().join("docsuite.db");

    let project_id = {
        let store = Arc::new(SqliteArtifactStore::open(&db_path, 2).await.unwrap());
        let harness = Harness::new();
        let coordinator = docsuite::WorkflowCoordinator::new(
            harness.generation.clone(),
            Arc::clone(&harness.scorer),
            store,
        );
        let run = coordinator
            .generate_all_docs(IDEA, Profile::Individual)
            .await
            .unwrap();
        run.project_id
    };

    let reopened = SqliteArtifactStore::open(&db_path, 1).await.unwrap();
    let run = reopened.get_run(&project_id).await.unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.phase_results.len(), 9);

    let artifacts = reopened.list_artifacts(&project_id).await.unwrap();
    assert_eq!(artifacts.len(), 9);
    assert!(artifacts
        .iter()
        .any(|a| a.output_type == DocumentType::DatabaseSchema));
}

#[tokio::test]
async fn test_missing_upstream_documents_are_listed_separately() {
    let harness = Harness::new();
    harness
        .generation
        .fail_label("technical_documentation", "provider down");

    let run = harness
        .bare_coordinator()
        .generate_all_docs_for("proj-missing", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(
        run.task_statuses["database_schema"].status,
        TaskStatus::Blocked
    );
    let api = &run.task_statuses["api_documentation"];
    assert_eq!(api.status, TaskStatus::Blocked);
    assert_eq!(
        api.blocked_by,
        vec![
            "technical_documentation".to_string(),
            "database_schema".to_string()
        ]
    );
}

#[tokio::test]
async fn test_revision_past_task_deadline_keeps_first_pass() {
    let harness = Harness::new();
    let draft = "# Requirements\nToo short to pass.";
    harness.generation.set_response("requirements", draft);
    harness.generation.set_mock_response(
        "requirements:improve",
        MockResponse::success(generated_document("requirements"))
            .with_delay(Duration::from_millis(500)),
    );

    let run = harness
        .coordinator_with_deadline(Duration::from_millis(200))
        .generate_all_docs_for("proj-deadline", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(
        run.task_statuses["requirements"].status,
        TaskStatus::Complete
    );
    assert_eq!(harness.generation.call_count("requirements"), 1);
    assert_eq!(harness.generation.call_count("requirements:improve"), 1);

    let requirements = &run.phase_results[&DocumentType::Requirements];
    assert_eq!(requirements.revision, 0);
    assert_eq!(requirements.content, draft);

    let stored = harness
        .store
        .get_artifact("proj-deadline", DocumentType::Requirements)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.content, draft);
}

#[tokio::test]
async fn test_generation_past_task_deadline_fails_task() {
    let harness = Harness::new();
    harness.generation.set_mock_response(
        "user_stories",
        MockResponse::success(generated_document("user_stories"))
            .with_delay(Duration::from_millis(500)),
    );

    let run = harness
        .coordinator_with_deadline(Duration::from_millis(200))
        .generate_all_docs_for("proj-slow", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::PartiallyCompleted);
    let stories = &run.task_statuses["user_stories"];
    assert_eq!(stories.status, TaskStatus::Failed);
    assert_eq!(stories.error.as_deref(), Some("Task timed out after 200ms"));
    assert_eq!(
        run.task_statuses["technical_documentation"].blocked_by,
        vec!["user_stories".to_string()]
    );
}

#[tokio::test]
async fn test_documents_are_cross_referenced_and_condensed() {
    let harness = Harness::new();
    let run = harness
        .full_coordinator()
        .generate_all_docs_for("proj-linked", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    let steps: Vec<&str> = run.packaging.iter().map(|o| o.step.as_str()).collect();
    assert_eq!(
        steps,
        vec!["cross_references", "document_index", "quality_review", "developer_brief"]
    );
    assert!(run.packaging.iter().all(|o| o.success));
    assert_eq!(run.packaging[0].produced.len(), 9);
    assert_eq!(run.packaging[3].produced, vec![DocumentType::DeveloperBrief]);

    // The linked versions replace the originals in the store and the run.
    let stories = harness
        .store
        .get_artifact("proj-linked", DocumentType::UserStories)
        .await
        .unwrap()
        .unwrap();
    assert!(stories.content.contains("## Related Documents"));
    assert!(stories
        .content
        .contains("Builds on:\n\n- Requirements Document (`requirements`)"));
    assert!(stories.content.contains("(`technical_documentation`)"));
    assert_eq!(
        run.phase_results[&DocumentType::UserStories].content,
        stories.content
    );

    // Later steps see the linked versions.
    let calls = harness.generation.calls();
    let brief = calls.iter().find(|c| c.label == "developer_brief").unwrap();
    assert!(brief.prompt.contains("## Related Documents"));
    assert!(brief.prompt.contains(IDEA));

    let stored_brief = harness
        .store
        .get_artifact("proj-linked", DocumentType::DeveloperBrief)
        .await
        .unwrap()
        .unwrap();
    assert!(stored_brief.content.starts_with("# Developer Brief"));
    // 9 documents plus the index, review and brief
    assert_eq!(harness.store.artifact_count("proj-linked").await, 12);
}

#[tokio::test]
async fn test_failed_brief_keeps_other_packaging() {
    let harness = Harness::new();
    harness
        .generation
        .fail_label("developer_brief", "quota exceeded");

    let run = harness
        .full_coordinator()
        .generate_all_docs_for("proj-brief", IDEA, Profile::Individual)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    let brief = run.packaging.last().unwrap();
    assert_eq!(brief.step, "developer_brief");
    assert!(!brief.success);
    assert!(brief.error.as_deref().unwrap().contains("quota exceeded"));
    assert!(run.packaging[..3].iter().all(|o| o.success));
    assert!(harness
        .store
        .get_artifact("proj-brief", DocumentType::DeveloperBrief)
        .await
        .unwrap()
        .is_none());
}
