//! Workflow coordinator: runs the three generation phases for one project.

use chrono::Utc;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::models::{
    Artifact, DocumentType, PackagingOutcome, Phase, PhaseSummary, Profile, ResolvedDependencies,
    RunStatus, SharedInputs, TaskDescriptor, TaskExecution, TaskStatus, WorkflowConfig,
    WorkflowRun,
};
use crate::domain::ports::{
    ArtifactStore, GenerationService, PackagingContext, PackagingStep, QualityScorer,
};
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::document_improver::DocumentImprover;
use crate::services::parallel_executor::{DependencyOutputs, ExecutionEvent, ParallelExecutor};
use crate::services::quality_gate::QualityGate;
use crate::services::task_catalog::TaskCatalog;

/// Scheduling limits for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub phase1_concurrency: usize,
    pub phase2_concurrency: usize,
    /// Per-task deadline. Generation still running at the deadline fails
    /// the task; a revision still running keeps the first pass.
    pub task_timeout: Option<Duration>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            phase1_concurrency: 4,
            phase2_concurrency: 8,
            task_timeout: None,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            phase1_concurrency: config.phase1_concurrency,
            phase2_concurrency: config.phase2_concurrency,
            task_timeout: (config.task_timeout_secs > 0)
                .then(|| Duration::from_secs(config.task_timeout_secs)),
        }
    }
}

/// Progress notifications for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    PhaseStarted { phase: Phase, task_count: usize },
    Task { phase: Phase, event: ExecutionEvent },
    PhaseCompleted { summary: PhaseSummary },
    PackagingStep { outcome: PackagingOutcome },
    RunFinished { project_id: String, status: RunStatus },
}

/// Everything a single task needs, cloned into its future.
#[derive(Clone)]
struct TaskContext {
    generation: Arc<dyn GenerationService>,
    gate: QualityGate,
    store: Arc<dyn ArtifactStore>,
    shared: Arc<SharedInputs>,
    task_timeout: Option<Duration>,
}

/// Generate a project id of the form `project_<YYYYmmdd_HHMMSS>_<8 hex>`.
pub fn new_project_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "project_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

/// Runs phases 1 to 3 and assembles the [`WorkflowRun`].
pub struct WorkflowCoordinator {
    generation: Arc<dyn GenerationService>,
    gate: QualityGate,
    store: Arc<dyn ArtifactStore>,
    packaging: Vec<Arc<dyn PackagingStep>>,
    catalog: TaskCatalog,
    resolver: DependencyResolver,
    settings: CoordinatorSettings,
    events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl WorkflowCoordinator {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        scorer: Arc<dyn QualityScorer>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let gate = QualityGate::new(scorer, DocumentImprover::new(Arc::clone(&generation)));
        Self {
            generation,
            gate,
            store,
            packaging: Vec::new(),
            catalog: TaskCatalog::new(),
            resolver: DependencyResolver::new(),
            settings: CoordinatorSettings::default(),
            events: None,
        }
    }

    #[must_use]
    pub fn with_quality_gate(mut self, gate: QualityGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: TaskCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_packaging_step(mut self, step: Arc<dyn PackagingStep>) -> Self {
        self.packaging.push(step);
        self
    }

    #[must_use]
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub const fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Generate the full documentation suite for `user_idea` under a fresh project id.
    pub async fn generate_all_docs(
        &self,
        user_idea: &str,
        profile: Profile,
    ) -> WorkflowResult<WorkflowRun> {
        self.generate_all_docs_for(&new_project_id(), user_idea, profile)
            .await
    }

    /// Generate the full documentation suite under the given project id.
    ///
    /// Task failures are reported in the returned run. A failed root task
    /// aborts the run after phase 1; the run is still returned with status
    /// [`RunStatus::Aborted`]. Errors are returned only for invalid input,
    /// a misconfigured task set, or storage failures while saving the run.
    #[instrument(skip_all, fields(project_id = %project_id, profile = %profile))]
    pub async fn generate_all_docs_for(
        &self,
        project_id: &str,
        user_idea: &str,
        profile: Profile,
    ) -> WorkflowResult<WorkflowRun> {
        let idea = user_idea.trim();
        if idea.is_empty() {
            return Err(WorkflowError::InvalidInput(
                "project idea must not be empty".to_string(),
            ));
        }
        if project_id.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "project id must not be empty".to_string(),
            ));
        }

        let phase1 = self.resolver.resolve(&self.catalog.phase1_tasks(profile))?;
        let upstream: BTreeSet<DocumentType> = phase1.iter().map(|d| d.output_type).collect();
        let phase2 = self
            .resolver
            .resolve_with_upstream(&self.catalog.phase2_tasks(profile), &upstream)?;

        let shared = Arc::new(SharedInputs {
            project_id: project_id.to_string(),
            user_idea: idea.to_string(),
            profile,
        });
        let mut run = WorkflowRun::new(project_id, idea, profile);
        self.store.save_run(&run).await?;
        info!(
            phase1_tasks = phase1.len(),
            phase2_tasks = phase2.len(),
            "Starting documentation workflow"
        );

        // Phase 1
        let executions = self
            .run_phase(
                Phase::Foundational,
                &phase1,
                &BTreeMap::new(),
                &shared,
                self.settings.phase1_concurrency,
            )
            .await?;
        let root_failure = find_root_failure(&phase1, &executions);
        self.record_phase(&mut run, Phase::Foundational, executions);

        if let Some(err) = root_failure {
            error!(error = %err, "Root task failed, aborting workflow");
            run.abort(&err);
            self.store.save_run(&run).await?;
            self.emit(WorkflowEvent::RunFinished {
                project_id: run.project_id.clone(),
                status: run.status,
            });
            return Ok(run);
        }
        self.store.save_run(&run).await?;

        // Phase 2
        let available = run.phase_results.clone();
        let executions = self
            .run_phase(
                Phase::Secondary,
                &phase2,
                &available,
                &shared,
                self.settings.phase2_concurrency,
            )
            .await?;
        self.record_phase(&mut run, Phase::Secondary, executions);
        self.store.save_run(&run).await?;

        // Phase 3
        let scheduled: BTreeMap<DocumentType, BTreeSet<DocumentType>> = phase1
            .iter()
            .chain(phase2.iter())
            .map(|d| (d.output_type, d.dependencies.clone()))
            .collect();
        self.run_packaging(&mut run, scheduled).await;

        run.finish();
        self.store.save_run(&run).await?;

        let summary = run.summary();
        info!(
            status = %run.status,
            generated = summary.generated,
            scheduled = summary.scheduled,
            success_rate = summary.success_rate(),
            "{} of {} documents generated",
            summary.generated,
            summary.scheduled
        );
        self.emit(WorkflowEvent::RunFinished {
            project_id: run.project_id.clone(),
            status: run.status,
        });
        Ok(run)
    }

    /// Look up a stored run.
    pub async fn get_status(&self, project_id: &str) -> WorkflowResult<Option<WorkflowRun>> {
        self.store.get_run(project_id).await
    }

    fn record_phase(
        &self,
        run: &mut WorkflowRun,
        phase: Phase,
        (executions, duration_ms): (BTreeMap<String, TaskExecution>, u64),
    ) {
        run.record_phase(phase, executions, duration_ms);
        if let Some(summary) = run.phases.last() {
            info!(
                phase = %phase,
                completed = summary.completed,
                failed = summary.failed,
                blocked = summary.blocked,
                duration_ms,
                "Phase finished"
            );
            self.emit(WorkflowEvent::PhaseCompleted {
                summary: summary.clone(),
            });
        }
    }

    async fn run_phase(
        &self,
        phase: Phase,
        descriptors: &[TaskDescriptor],
        upstream: &BTreeMap<DocumentType, Artifact>,
        shared: &Arc<SharedInputs>,
        max_concurrency: usize,
    ) -> WorkflowResult<(BTreeMap<String, TaskExecution>, u64)> {
        info!(phase = %phase, tasks = descriptors.len(), max_concurrency, "Starting phase");
        self.emit(WorkflowEvent::PhaseStarted {
            phase,
            task_count: descriptors.len(),
        });

        let mut executor: ParallelExecutor<Artifact> = ParallelExecutor::new();

        let forwarder = if let Some(outer) = self.events.clone() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            executor = executor.with_events(tx);
            Some(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let _ = outer.send(WorkflowEvent::Task { phase, event });
                }
            }))
        } else {
            None
        };

        let producers: HashMap<DocumentType, &str> = descriptors
            .iter()
            .map(|d| (d.output_type, d.id.as_str()))
            .collect();
        let context = TaskContext {
            generation: Arc::clone(&self.generation),
            gate: self.gate.clone(),
            store: Arc::clone(&self.store),
            shared: Arc::clone(shared),
            task_timeout: self.settings.task_timeout,
        };

        for descriptor in descriptors {
            let mut in_phase = Vec::new();
            let mut from_upstream = ResolvedDependencies::new();
            let mut missing = Vec::new();
            for dep in &descriptor.dependencies {
                if let Some(id) = producers.get(dep) {
                    in_phase.push((*id).to_string());
                } else if let Some(artifact) = upstream.get(dep) {
                    from_upstream.insert(*dep, artifact.clone());
                } else {
                    missing.push(dep.as_str());
                }
            }

            let ctx = context.clone();
            let task = descriptor.clone();
            executor.add_task(
                descriptor.id.clone(),
                move |outputs| run_task(ctx, task, from_upstream, outputs),
                in_phase,
            )?;
            if !missing.is_empty() {
                executor.block_task(&descriptor.id, missing)?;
            }
        }

        let started = Instant::now();
        let results = executor.execute(max_concurrency).await?;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(handle) = forwarder {
            if let Err(err) = handle.await {
                warn!(error = %err, "Event forwarder stopped unexpectedly");
            }
        }

        Ok((results.into_iter().collect(), duration_ms))
    }

    async fn run_packaging(
        &self,
        run: &mut WorkflowRun,
        scheduled: BTreeMap<DocumentType, BTreeSet<DocumentType>>,
    ) {
        let mut context = PackagingContext {
            project_id: run.project_id.clone(),
            user_idea: run.user_idea.clone(),
            profile: run.profile,
            artifacts: run.phase_results.clone(),
            missing: scheduled
                .keys()
                .filter(|t| !run.phase_results.contains_key(t))
                .copied()
                .collect(),
            dependencies: scheduled,
        };

        self.emit(WorkflowEvent::PhaseStarted {
            phase: Phase::Packaging,
            task_count: self.packaging.len(),
        });
        let started = Instant::now();

        for step in &self.packaging {
            let name = step.name();
            let result = AssertUnwindSafe(step.run(&context)).catch_unwind().await;
            let outcome = match result {
                Ok(Ok(artifacts)) => {
                    let outcome = self.save_packaged(name, &run.project_id, &artifacts).await;
                    if outcome.success {
                        // Rewritten documents replace the originals for later steps.
                        for artifact in artifacts {
                            if let Some(existing) = context.artifacts.get_mut(&artifact.output_type) {
                                run.phase_results
                                    .insert(artifact.output_type, artifact.clone());
                                *existing = artifact;
                            }
                        }
                    }
                    outcome
                }
                Ok(Err(err)) => {
                    warn!(step = name, error = %err, "Packaging step failed");
                    PackagingOutcome {
                        step: name.to_string(),
                        success: false,
                        error: Some(err.to_string()),
                        produced: Vec::new(),
                    }
                }
                Err(_) => {
                    error!(step = name, "Packaging step panicked");
                    PackagingOutcome {
                        step: name.to_string(),
                        success: false,
                        error: Some(
                            WorkflowError::Packaging {
                                step: name.to_string(),
                                reason: "step panicked".to_string(),
                            }
                            .to_string(),
                        ),
                        produced: Vec::new(),
                    }
                }
            };
            self.emit(WorkflowEvent::PackagingStep {
                outcome: outcome.clone(),
            });
            run.packaging.push(outcome);
        }

        let completed = run.packaging.iter().filter(|o| o.success).count();
        let summary = PhaseSummary {
            phase: Phase::Packaging,
            total: run.packaging.len(),
            completed,
            failed: run.packaging.len() - completed,
            blocked: 0,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        self.emit(WorkflowEvent::PhaseCompleted {
            summary: summary.clone(),
        });
        run.phases.push(summary);
    }

    async fn save_packaged(
        &self,
        step: &str,
        project_id: &str,
        artifacts: &[Artifact],
    ) -> PackagingOutcome {
        let mut produced = Vec::with_capacity(artifacts.len());
        let mut failure = None;
        for artifact in artifacts {
            match self
                .store
                .save_artifact(project_id, artifact.output_type, artifact)
                .await
            {
                Ok(()) => produced.push(artifact.output_type),
                Err(err) => {
                    warn!(step, error = %err, "Could not save packaging output");
                    failure = Some(err.to_string());
                }
            }
        }
        info!(step, produced = produced.len(), "Packaging step finished");
        PackagingOutcome {
            step: step.to_string(),
            success: failure.is_none(),
            error: failure,
            produced,
        }
    }
}

fn find_root_failure(
    descriptors: &[TaskDescriptor],
    executions: &(BTreeMap<String, TaskExecution>, u64),
) -> Option<WorkflowError> {
    descriptors
        .iter()
        .filter(|d| d.dependencies.is_empty())
        .find_map(|d| {
            let execution = executions.0.get(&d.id)?;
            (execution.status == TaskStatus::Failed).then(|| WorkflowError::RootTaskFailed {
                task_id: d.id.clone(),
                reason: execution
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
        })
}

async fn run_task(
    ctx: TaskContext,
    descriptor: TaskDescriptor,
    mut resolved: ResolvedDependencies,
    outputs: DependencyOutputs<Artifact>,
) -> WorkflowResult<Artifact> {
    for artifact in outputs.into_values() {
        resolved.insert(artifact.output_type, artifact);
    }
    let input = descriptor.build_input(&resolved, &ctx.shared);
    let output_type = descriptor.output_type;
    let deadline = ctx
        .task_timeout
        .map(|limit| (tokio::time::Instant::now() + limit, limit));

    let generate = || {
        within(deadline, async {
            let text = ctx.generation.generate(&input.prompt, &input.options).await?;
            let text = text.trim();
            if text.is_empty() {
                return Err(WorkflowError::GenerationFailed(format!(
                    "empty response for {output_type}"
                )));
            }
            Ok(Artifact::new(output_type, text))
        })
    };

    let artifact = match descriptor.quality_threshold {
        Some(threshold) => {
            ctx.gate
                .apply_until(generate, threshold, deadline.map(|(at, _)| at))
                .await?
        }
        None => generate().await?,
    };

    ctx.store
        .save_artifact(&ctx.shared.project_id, output_type, &artifact)
        .await?;
    Ok(artifact)
}

async fn within<T>(
    deadline: Option<(tokio::time::Instant, Duration)>,
    work: impl Future<Output = WorkflowResult<T>>,
) -> WorkflowResult<T> {
    match deadline {
        Some((at, limit)) => tokio::time::timeout_at(at, work)
            .await
            .unwrap_or_else(|_| Err(WorkflowError::TaskTimedOut(limit))),
        None => work.await,
    }
}
