//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use docsuite::adapters::generation::MockGenerationService;
use docsuite::adapters::packaging::{
    CrossReferenceStep, DeveloperBriefStep, DocumentIndexStep, QualityReviewStep,
};
use docsuite::adapters::quality::HeuristicQualityScorer;
use docsuite::adapters::storage::InMemoryArtifactStore;
use docsuite::domain::ports::QualityScorer;
use docsuite::services::CoordinatorSettings;
use docsuite::WorkflowCoordinator;

pub const IDEA: &str = "A shared todo list for small teams with reminders and a web dashboard";

/// Handles to the fakes behind a coordinator built by [`coordinator`].
pub struct Harness {
    pub generation: Arc<MockGenerationService>,
    pub store: Arc<InMemoryArtifactStore>,
    pub scorer: Arc<dyn QualityScorer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_generation(MockGenerationService::new())
    }

    pub fn with_generation(generation: MockGenerationService) -> Self {
        Self {
            generation: Arc::new(generation),
            store: Arc::new(InMemoryArtifactStore::new()),
            scorer: Arc::new(HeuristicQualityScorer::new()),
        }
    }

    /// Coordinator over the fakes, without packaging steps.
    pub fn bare_coordinator(&self) -> WorkflowCoordinator {
        WorkflowCoordinator::new(
            self.generation.clone(),
            Arc::clone(&self.scorer),
            self.store.clone(),
        )
        .with_settings(CoordinatorSettings {
            phase1_concurrency: 4,
            phase2_concurrency: 8,
            task_timeout: Some(Duration::from_secs(10)),
        })
    }

    /// Coordinator with the standard packaging steps.
    pub fn coordinator(&self) -> WorkflowCoordinator {
        self.bare_coordinator()
            .with_packaging_step(Arc::new(DocumentIndexStep::new()))
            .with_packaging_step(Arc::new(QualityReviewStep::new(Arc::clone(&self.scorer))))
    }

    /// Coordinator with every packaging step, in the order the application
    /// registers them.
    pub fn full_coordinator(&self) -> WorkflowCoordinator {
        self.bare_coordinator()
            .with_packaging_step(Arc::new(CrossReferenceStep::new()))
            .with_packaging_step(Arc::new(DocumentIndexStep::new()))
            .with_packaging_step(Arc::new(QualityReviewStep::new(Arc::clone(&self.scorer))))
            .with_packaging_step(Arc::new(DeveloperBriefStep::new(self.generation.clone())))
    }

    /// Bare coordinator with a per-task deadline.
    pub fn coordinator_with_deadline(&self, limit: Duration) -> WorkflowCoordinator {
        self.bare_coordinator().with_settings(CoordinatorSettings {
            phase1_concurrency: 4,
            phase2_concurrency: 8,
            task_timeout: Some(limit),
        })
    }
}

/// Temporary directory removed on drop.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Route test logs through the test writer.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
