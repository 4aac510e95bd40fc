//! Packaging port - phase-3 steps that run over the produced artifacts.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::errors::WorkflowResult;
use crate::domain::models::{Artifact, DocumentType, Profile};

/// View handed to every packaging step. Artifacts returned by a step for an
/// output type already present replace that artifact for later steps.
#[derive(Debug, Clone)]
pub struct PackagingContext {
    pub project_id: String,
    pub user_idea: String,
    pub profile: Profile,
    /// Every artifact produced by phases 1 and 2.
    pub artifacts: BTreeMap<DocumentType, Artifact>,
    /// Output types that were scheduled but not produced.
    pub missing: Vec<DocumentType>,
    /// Declared dependencies of every scheduled output type.
    pub dependencies: BTreeMap<DocumentType, BTreeSet<DocumentType>>,
}

/// A post-processing step. Failures are recorded and never affect earlier phases.
#[async_trait]
pub trait PackagingStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the step, returning any new artifacts to store.
    async fn run(&self, context: &PackagingContext) -> WorkflowResult<Vec<Artifact>>;
}
