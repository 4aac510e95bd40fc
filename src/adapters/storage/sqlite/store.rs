//! SQLite implementation of the ArtifactStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::Path;

use super::connection::{create_pool, create_test_pool, database_url, PoolConfig};
use super::migrations::{all_embedded_migrations, Migrator};
use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{Artifact, DocumentType, WorkflowRun};
use crate::domain::ports::ArtifactStore;

#[derive(Clone)]
pub struct SqliteArtifactStore {
    pool: SqlitePool,
}

impl SqliteArtifactStore {
    /// Wrap an already migrated pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database file at `path` and apply pending migrations.
    pub async fn open(path: &Path, max_connections: u32) -> WorkflowResult<Self> {
        let pool = create_pool(
            &database_url(path),
            Some(PoolConfig {
                max_connections,
                ..PoolConfig::default()
            }),
        )
        .await?;
        Migrator::new(pool.clone())
            .run(&all_embedded_migrations())
            .await?;
        Ok(Self::new(pool))
    }

    /// Migrated in-memory database.
    pub async fn in_memory() -> WorkflowResult<Self> {
        let pool = create_test_pool().await?;
        Migrator::new(pool.clone())
            .run(&all_embedded_migrations())
            .await?;
        Ok(Self::new(pool))
    }
}

type ArtifactRow = (String, String, Option<f64>, i64, String);

fn artifact_from_row(row: ArtifactRow) -> WorkflowResult<Artifact> {
    let (output_type, content, quality_score, revision, generated_at) = row;
    let output_type = output_type
        .parse::<DocumentType>()
        .map_err(WorkflowError::Serialization)?;
    let generated_at = DateTime::parse_from_rfc3339(&generated_at)
        .map_err(|e| WorkflowError::Serialization(format!("bad timestamp {generated_at}: {e}")))?
        .with_timezone(&Utc);

    Ok(Artifact {
        output_type,
        content,
        quality_score,
        revision: u32::try_from(revision).unwrap_or_default(),
        generated_at,
    })
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    async fn save_artifact(
        &self,
        project_id: &str,
        output_type: DocumentType,
        artifact: &Artifact,
    ) -> WorkflowResult<()> {
        sqlx::query(
            "INSERT INTO artifacts (project_id, output_type, content, quality_score, revision, generated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (project_id, output_type) DO UPDATE SET
                content = excluded.content,
                quality_score = excluded.quality_score,
                revision = excluded.revision,
                generated_at = excluded.generated_at",
        )
        .bind(project_id)
        .bind(output_type.as_str())
        .bind(&artifact.content)
        .bind(artifact.quality_score)
        .bind(i64::from(artifact.revision))
        .bind(artifact.generated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_artifact(
        &self,
        project_id: &str,
        output_type: DocumentType,
    ) -> WorkflowResult<Option<Artifact>> {
        let row: Option<ArtifactRow> = sqlx::query_as(
            "SELECT output_type, content, quality_score, revision, generated_at
             FROM artifacts WHERE project_id = ? AND output_type = ?",
        )
        .bind(project_id)
        .bind(output_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(artifact_from_row).transpose()
    }

    async fn list_artifacts(&self, project_id: &str) -> WorkflowResult<Vec<Artifact>> {
        let rows: Vec<ArtifactRow> = sqlx::query_as(
            "SELECT output_type, content, quality_score, revision, generated_at
             FROM artifacts WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut artifacts = rows
            .into_iter()
            .map(artifact_from_row)
            .collect::<WorkflowResult<Vec<_>>>()?;
        artifacts.sort_by_key(|a| a.output_type);
        Ok(artifacts)
    }

    async fn save_run(&self, run: &WorkflowRun) -> WorkflowResult<()> {
        let run_json = serde_json::to_string(run)?;
        sqlx::query(
            "INSERT INTO workflow_runs (project_id, profile, status, run_json, started_at, finished_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (project_id) DO UPDATE SET
                status = excluded.status,
                run_json = excluded.run_json,
                finished_at = excluded.finished_at,
                updated_at = excluded.updated_at",
        )
        .bind(&run.project_id)
        .bind(run.profile.as_str())
        .bind(run.status.as_str())
        .bind(&run_json)
        .bind(run.started_at.to_rfc3339())
        .bind(run.finished_at.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run(&self, project_id: &str) -> WorkflowResult<Option<WorkflowRun>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT run_json FROM workflow_runs WHERE project_id = ?")
                .bind(project_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
