//! Artifact store port - persistence for generated documents and runs.

use async_trait::async_trait;

use crate::domain::errors::WorkflowResult;
use crate::domain::models::{Artifact, DocumentType, WorkflowRun};

/// Repository interface for artifacts and workflow runs.
///
/// Saving an artifact for an existing `(project_id, output_type)` replaces it.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save_artifact(
        &self,
        project_id: &str,
        output_type: DocumentType,
        artifact: &Artifact,
    ) -> WorkflowResult<()>;

    async fn get_artifact(
        &self,
        project_id: &str,
        output_type: DocumentType,
    ) -> WorkflowResult<Option<Artifact>>;

    /// All artifacts of a project, ordered by output type.
    async fn list_artifacts(&self, project_id: &str) -> WorkflowResult<Vec<Artifact>>;

    async fn save_run(&self, run: &WorkflowRun) -> WorkflowResult<()>;

    async fn get_run(&self, project_id: &str) -> WorkflowResult<Option<WorkflowRun>>;
}
