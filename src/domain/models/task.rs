//! Task descriptors and their run-time execution records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::document::{Artifact, DocumentType};
use super::workflow::Profile;
use crate::domain::errors::{WorkflowError, WorkflowResult};
use crate::domain::ports::generation::GenerationOptions;

/// Outputs of a task's declared dependencies, keyed by output type.
pub type ResolvedDependencies = BTreeMap<DocumentType, Artifact>;

/// Inputs shared by every task of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedInputs {
    pub project_id: String,
    pub user_idea: String,
    pub profile: Profile,
}

/// Everything needed for one call to the generation service. The system
/// prompt travels in `options.system`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationInput {
    pub prompt: String,
    pub options: GenerationOptions,
}

/// Maps resolved dependency outputs and shared inputs to a generation request.
pub type InputBuilder =
    Arc<dyn Fn(&ResolvedDependencies, &SharedInputs) -> GenerationInput + Send + Sync>;

/// Immutable definition of one generation step.
#[derive(Clone)]
pub struct TaskDescriptor {
    /// Unique within a phase. Defaults to the output type's string form.
    pub id: String,
    pub output_type: DocumentType,
    /// Output types this task consumes.
    pub dependencies: BTreeSet<DocumentType>,
    /// Minimum quality score in [0, 100]; `None` disables the quality gate.
    pub quality_threshold: Option<f64>,
    input_builder: InputBuilder,
}

impl TaskDescriptor {
    pub fn new<F>(
        output_type: DocumentType,
        dependencies: impl IntoIterator<Item = DocumentType>,
        input_builder: F,
    ) -> Self
    where
        F: Fn(&ResolvedDependencies, &SharedInputs) -> GenerationInput + Send + Sync + 'static,
    {
        Self {
            id: output_type.as_str().to_string(),
            output_type,
            dependencies: dependencies.into_iter().collect(),
            quality_threshold: None,
            input_builder: Arc::new(input_builder),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Enable the quality gate. The threshold is clamped to [0, 100].
    #[must_use]
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = Some(threshold.clamp(0.0, 100.0));
        self
    }

    #[must_use]
    pub fn without_quality_gate(mut self) -> Self {
        self.quality_threshold = None;
        self
    }

    pub const fn is_gated(&self) -> bool {
        self.quality_threshold.is_some()
    }

    pub fn build_input(
        &self,
        dependencies: &ResolvedDependencies,
        shared: &SharedInputs,
    ) -> GenerationInput {
        (self.input_builder)(dependencies, shared)
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("output_type", &self.output_type)
            .field("dependencies", &self.dependencies)
            .field("quality_threshold", &self.quality_threshold)
            .finish_non_exhaustive()
    }
}

/// Status of a task within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dependencies
    #[default]
    Pending,
    /// Work is in flight
    Running,
    /// Work finished and produced a result
    Complete,
    /// Work raised an error
    Failed,
    /// Never started because a dependency failed or was blocked
    Blocked,
}

impl TaskStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    /// Check if this is a terminal state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Blocked)
    }

    /// Whether dependents of a task in this state can never run.
    pub const fn blocks_dependents(&self) -> bool {
        matches!(self, Self::Failed | Self::Blocked)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Pending => vec![Self::Running, Self::Blocked],
            Self::Running => vec![Self::Complete, Self::Failed],
            Self::Complete | Self::Failed | Self::Blocked => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "complete" | "completed" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!("Unknown task status: {s}")),
        }
    }
}

/// Run-time record of one task's progress.
///
/// `result` is present iff the task is `Complete`, `error` iff `Failed`, and
/// `blocked_by` is non-empty iff `Blocked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution<T = Artifact> {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<T> TaskExecution<T> {
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            blocked_by: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Transition to a new status, stamping timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> WorkflowResult<()> {
        if !self.status.can_transition_to(new_status) {
            return Err(WorkflowError::InvalidStateTransition {
                task_id: self.task_id.clone(),
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }

        self.status = new_status;
        match new_status {
            TaskStatus::Running => self.started_at = Some(Utc::now()),
            TaskStatus::Complete | TaskStatus::Failed | TaskStatus::Blocked => {
                self.finished_at = Some(Utc::now());
            }
            TaskStatus::Pending => {}
        }
        Ok(())
    }

    pub fn start(&mut self) -> WorkflowResult<()> {
        self.transition_to(TaskStatus::Running)
    }

    pub fn complete(&mut self, result: T) -> WorkflowResult<()> {
        self.transition_to(TaskStatus::Complete)?;
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> WorkflowResult<()> {
        self.transition_to(TaskStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn block(&mut self, blocked_by: Vec<String>) -> WorkflowResult<()> {
        self.transition_to(TaskStatus::Blocked)?;
        self.blocked_by = blocked_by;
        Ok(())
    }

    /// Wall-clock time between start and finish, if the task ran.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    /// Why this task did not complete, for reports.
    pub fn failure_reason(&self) -> Option<String> {
        match self.status {
            TaskStatus::Failed => Some(
                self.error
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ),
            TaskStatus::Blocked => Some(format!(
                "blocked by failed dependency: {}",
                self.blocked_by.join(", ")
            )),
            _ => None,
        }
    }
}
