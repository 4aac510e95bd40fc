//! In-memory artifact store.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::domain::errors::WorkflowResult;
use crate::domain::models::{Artifact, DocumentType, WorkflowRun};
use crate::domain::ports::ArtifactStore;

/// Keeps everything in process memory. Used by tests and `storage.backend: memory`.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    artifacts: RwLock<HashMap<String, BTreeMap<DocumentType, Artifact>>>,
    runs: RwLock<HashMap<String, WorkflowRun>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn artifact_count(&self, project_id: &str) -> usize {
        self.artifacts
            .read()
            .await
            .get(project_id)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn save_artifact(
        &self,
        project_id: &str,
        output_type: DocumentType,
        artifact: &Artifact,
    ) -> WorkflowResult<()> {
        self.artifacts
            .write()
            .await
            .entry(project_id.to_string())
            .or_default()
            .insert(output_type, artifact.clone());
        Ok(())
    }

    async fn get_artifact(
        &self,
        project_id: &str,
        output_type: DocumentType,
    ) -> WorkflowResult<Option<Artifact>> {
        Ok(self
            .artifacts
            .read()
            .await
            .get(project_id)
            .and_then(|docs| docs.get(&output_type))
            .cloned())
    }

    async fn list_artifacts(&self, project_id: &str) -> WorkflowResult<Vec<Artifact>> {
        Ok(self
            .artifacts
            .read()
            .await
            .get(project_id)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_run(&self, run: &WorkflowRun) -> WorkflowResult<()> {
        self.runs
            .write()
            .await
            .insert(run.project_id.clone(), run.clone());
        Ok(())
    }

    async fn get_run(&self, project_id: &str) -> WorkflowResult<Option<WorkflowRun>> {
        Ok(self.runs.read().await.get(project_id).cloned())
    }
}
