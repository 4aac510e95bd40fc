//! Workflow run model: profiles, phases, and the persisted run record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::document::{Artifact, DocumentType};
use super::task::{TaskExecution, TaskStatus};
use crate::domain::errors::{WorkflowError, WorkflowResult};

/// Selects which tasks are scheduled and with which dependencies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Full suite for a team project
    #[default]
    Team,
    /// Reduced suite for a solo developer, no charter or business documents
    Individual,
}

impl Profile {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Individual => "individual",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "team" => Ok(Self::Team),
            "individual" => Ok(Self::Individual),
            _ => Err(format!("Unknown profile: {s}")),
        }
    }
}

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase 1: gated foundational documents
    Foundational,
    /// Phase 2: ungated secondary documents
    Secondary,
    /// Phase 3: packaging over everything produced
    Packaging,
}

impl Phase {
    pub const fn number(&self) -> u8 {
        match self {
            Self::Foundational => 1,
            Self::Secondary => 2,
            Self::Packaging => 3,
        }
    }

    /// Key used for per-phase configuration such as model overrides.
    pub const fn config_key(&self) -> &'static str {
        match self {
            Self::Foundational => "phase1",
            Self::Secondary => "phase2",
            Self::Packaging => "phase3",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Foundational => "foundational",
            Self::Secondary => "secondary",
            Self::Packaging => "packaging",
        };
        write!(f, "phase {} ({name})", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    PartiallyCompleted,
    Aborted,
}

impl RunStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts for one executed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub duration_ms: u64,
}

impl PhaseSummary {
    pub fn from_executions<'a>(
        phase: Phase,
        executions: impl IntoIterator<Item = &'a TaskExecution>,
        duration_ms: u64,
    ) -> Self {
        let mut summary = Self {
            phase,
            total: 0,
            completed: 0,
            failed: 0,
            blocked: 0,
            duration_ms,
        };
        for execution in executions {
            summary.total += 1;
            match execution.status {
                TaskStatus::Complete => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Blocked => summary.blocked += 1,
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }
        summary
    }
}

/// Result of one packaging step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingOutcome {
    pub step: String,
    pub success: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub produced: Vec<DocumentType>,
}

/// The record of one end-to-end generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub project_id: String,
    pub user_idea: String,
    pub profile: Profile,
    pub status: RunStatus,
    /// Successful outputs of phases 1 and 2.
    pub phase_results: BTreeMap<DocumentType, Artifact>,
    /// Every scheduled task, including failed and blocked ones.
    pub task_statuses: BTreeMap<String, TaskExecution>,
    pub failed_task_ids: Vec<String>,
    pub phases: Vec<PhaseSummary>,
    pub packaging: Vec<PackagingOutcome>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn new(
        project_id: impl Into<String>,
        user_idea: impl Into<String>,
        profile: Profile,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_idea: user_idea.into(),
            profile,
            status: RunStatus::Running,
            phase_results: BTreeMap::new(),
            task_statuses: BTreeMap::new(),
            failed_task_ids: Vec::new(),
            phases: Vec::new(),
            packaging: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Fold one phase's executions into the run.
    ///
    /// Failed and blocked ids are appended in id order so the list is stable
    /// across runs.
    pub fn record_phase(
        &mut self,
        phase: Phase,
        executions: BTreeMap<String, TaskExecution>,
        duration_ms: u64,
    ) {
        self.phases.push(PhaseSummary::from_executions(
            phase,
            executions.values(),
            duration_ms,
        ));

        for (task_id, execution) in executions {
            if execution.status.blocks_dependents() {
                self.failed_task_ids.push(task_id.clone());
            }
            if let Some(artifact) = execution.result.as_ref() {
                self.phase_results
                    .insert(artifact.output_type, artifact.clone());
            }
            self.task_statuses.insert(task_id, execution);
        }
    }

    pub fn abort(&mut self, error: &WorkflowError) {
        self.status = RunStatus::Aborted;
        self.error = Some(error.to_string());
        self.finished_at = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        self.status = if self.failed_task_ids.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::PartiallyCompleted
        };
        self.finished_at = Some(Utc::now());
    }

    pub fn is_aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }

    /// Turn an aborted run back into the error that aborted it.
    ///
    /// The reason comes from the failed task's own record; `self.error`
    /// already holds the rendered abort message.
    pub fn ensure_not_aborted(&self) -> WorkflowResult<()> {
        if !self.is_aborted() {
            return Ok(());
        }
        let failed = self
            .task_statuses
            .values()
            .find(|t| t.status == TaskStatus::Failed);
        Err(WorkflowError::RootTaskFailed {
            task_id: failed.map_or_else(|| "unknown".to_string(), |t| t.task_id.clone()),
            reason: failed
                .and_then(|t| t.error.clone())
                .unwrap_or_else(|| "run aborted".to_string()),
        })
    }

    pub fn summary(&self) -> RunSummary {
        let failures = self
            .failed_task_ids
            .iter()
            .map(|id| {
                let reason = self
                    .task_statuses
                    .get(id)
                    .and_then(TaskExecution::failure_reason)
                    .unwrap_or_else(|| "unknown".to_string());
                (id.clone(), reason)
            })
            .collect();

        RunSummary {
            project_id: self.project_id.clone(),
            status: self.status,
            generated: self.phase_results.len(),
            scheduled: self.task_statuses.len(),
            failures,
        }
    }
}

/// Condensed view of a run for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub project_id: String,
    pub status: RunStatus,
    pub generated: usize,
    pub scheduled: usize,
    pub failures: Vec<(String, String)>,
}

impl RunSummary {
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.scheduled == 0 {
            return 0.0;
        }
        self.generated as f64 / self.scheduled as f64 * 100.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} documents generated",
            self.generated, self.scheduled
        )?;
        for (task_id, reason) in &self.failures {
            write!(f, "\n  - {task_id}: {reason}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(id: &str, doc_type: DocumentType) -> TaskExecution {
        let mut execution = TaskExecution::pending(id);
        execution.start().unwrap();
        execution.complete(Artifact::new(doc_type, "body")).unwrap();
        execution
    }

    fn failed(id: &str, reason: &str) -> TaskExecution {
        let mut execution = TaskExecution::pending(id);
        execution.start().unwrap();
        execution.fail(reason).unwrap();
        execution
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("Team".parse::<Profile>(), Ok(Profile::Team));
        assert_eq!("individual".parse::<Profile>(), Ok(Profile::Individual));
        assert!("solo".parse::<Profile>().is_err());
    }

    #[test]
    fn test_record_phase_and_summary() {
        let mut run = WorkflowRun::new("project_x", "idea", Profile::Team);
        let mut executions = BTreeMap::new();
        executions.insert(
            "requirements".to_string(),
            complete("requirements", DocumentType::Requirements),
        );
        executions.insert(
            "user_stories".to_string(),
            failed("user_stories", "Generation failed: boom"),
        );
        let mut blocked = TaskExecution::pending("technical_documentation");
        blocked.block(vec!["user_stories".to_string()]).unwrap();
        executions.insert("technical_documentation".to_string(), blocked);

        run.record_phase(Phase::Foundational, executions, 12);
        run.finish();

        assert_eq!(run.status, RunStatus::PartiallyCompleted);
        assert_eq!(
            run.failed_task_ids,
            vec!["technical_documentation", "user_stories"]
        );
        assert_eq!(run.phases[0].completed, 1);
        assert_eq!(run.phases[0].failed, 1);
        assert_eq!(run.phases[0].blocked, 1);

        let summary = run.summary();
        let rendered = summary.to_string();
        assert!(rendered.starts_with("1 of 3 documents generated"));
        assert!(rendered.contains("user_stories: Generation failed: boom"));
        assert!(rendered.contains("blocked by failed dependency: user_stories"));
    }

    #[test]
    fn test_ensure_not_aborted() {
        let mut run = WorkflowRun::new("project_x", "idea", Profile::Individual);
        assert!(run.ensure_not_aborted().is_ok());

        let mut executions = BTreeMap::new();
        executions.insert("requirements".to_string(), failed("requirements", "down"));
        run.record_phase(Phase::Foundational, executions, 1);
        run.abort(&WorkflowError::RootTaskFailed {
            task_id: "requirements".to_string(),
            reason: "down".to_string(),
        });

        assert_eq!(
            run.error.as_deref(),
            Some("Root task 'requirements' failed: down")
        );
        let err = run.ensure_not_aborted().unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::RootTaskFailed { ref task_id, ref reason }
                if task_id == "requirements" && reason == "down"
        ));
        assert_eq!(err.to_string(), "Root task 'requirements' failed: down");
    }

    #[test]
    fn test_finish_without_failures_is_completed() {
        let mut run = WorkflowRun::new("p", "idea", Profile::Team);
        run.finish();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.finished_at.is_some());
        assert!((run.summary().success_rate() - 0.0).abs() < f64::EPSILON);
    }
}
