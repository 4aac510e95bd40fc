//! Process-scoped service registry.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::adapters::generation::build_generation_service;
use crate::adapters::packaging::{
    CrossReferenceStep, DeveloperBriefStep, DocumentIndexStep, QualityReviewStep,
};
use crate::adapters::quality::HeuristicQualityScorer;
use crate::adapters::storage::{InMemoryArtifactStore, SqliteArtifactStore};
use crate::domain::errors::WorkflowResult;
use crate::domain::models::{Config, Phase, StorageBackend};
use crate::domain::ports::{ArtifactStore, GenerationService, PackagingStep, QualityScorer};
use crate::services::{
    CoordinatorSettings, DocumentImprover, QualityGate, TaskCatalog, WorkflowCoordinator,
};

/// Owns the generation backend, scorer, store and packaging steps for the
/// lifetime of the process, and builds coordinators from them.
#[derive(Clone)]
pub struct Services {
    pub config: Config,
    pub generation: Arc<dyn GenerationService>,
    pub scorer: Arc<dyn QualityScorer>,
    pub store: Arc<dyn ArtifactStore>,
    pub packaging: Vec<Arc<dyn PackagingStep>>,
}

impl Services {
    /// Build every component selected by `config`.
    pub async fn from_config(config: Config) -> WorkflowResult<Self> {
        let generation = build_generation_service(&config)?;
        let store: Arc<dyn ArtifactStore> = match config.storage.backend {
            StorageBackend::Sqlite => Arc::new(
                SqliteArtifactStore::open(
                    Path::new(&config.storage.database_path),
                    config.storage.max_connections,
                )
                .await?,
            ),
            StorageBackend::Memory => Arc::new(InMemoryArtifactStore::new()),
        };
        info!(
            provider = generation.name(),
            storage = ?config.storage.backend,
            "Services initialized"
        );
        Ok(Self::with_components(config, generation, store))
    }

    /// Use the given backend and store with the default scorer and packaging steps.
    pub fn with_components(
        config: Config,
        generation: Arc<dyn GenerationService>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let scorer: Arc<dyn QualityScorer> = Arc::new(HeuristicQualityScorer::new());
        let brief = DeveloperBriefStep::new(Arc::clone(&generation))
            .with_model(Some(
                config
                    .generation
                    .model_for(Phase::Packaging.config_key())
                    .to_string(),
            ))
            .with_max_tokens(config.generation.max_tokens);
        let packaging: Vec<Arc<dyn PackagingStep>> = vec![
            Arc::new(CrossReferenceStep::new()),
            Arc::new(DocumentIndexStep::new()),
            Arc::new(QualityReviewStep::new(Arc::clone(&scorer))),
            Arc::new(brief),
        ];
        Self {
            config,
            generation,
            scorer,
            store,
            packaging,
        }
    }

    pub fn catalog(&self) -> TaskCatalog {
        TaskCatalog::from_config(&self.config)
    }

    /// A coordinator configured from this registry.
    pub fn coordinator(&self) -> WorkflowCoordinator {
        let generation_config = &self.config.generation;
        // Revisions only happen for gated phase-1 documents.
        let improver = DocumentImprover::new(Arc::clone(&self.generation))
            .with_model(Some(
                generation_config
                    .model_for(Phase::Foundational.config_key())
                    .to_string(),
            ))
            .with_max_tokens(generation_config.max_tokens);

        let mut coordinator = WorkflowCoordinator::new(
            Arc::clone(&self.generation),
            Arc::clone(&self.scorer),
            Arc::clone(&self.store),
        )
        .with_quality_gate(QualityGate::new(Arc::clone(&self.scorer), improver))
        .with_catalog(self.catalog())
        .with_settings(CoordinatorSettings::from_config(&self.config.workflow));

        for step in &self.packaging {
            coordinator = coordinator.with_packaging_step(Arc::clone(step));
        }
        coordinator
    }
}
