//! Domain errors for the docsuite workflow engine.

use std::time::Duration;
use thiserror::Error;

use super::ports::generation::GenerationError;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Errors that can occur while defining or running a documentation workflow.
///
/// Configuration errors (`Cycle`, `UnknownDependency`, `DuplicateTask`,
/// `InvalidConcurrency`) are raised synchronously. Task-level errors are
/// caught at the task boundary and stored on the task's execution record.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Task dependency cycle detected at '{task_id}': {}", format_cycle_path(.path))]
    Cycle { task_id: String, path: Vec<String> },

    #[error("Task '{task_id}' depends on '{dependency}', which no task produces")]
    UnknownDependency { task_id: String, dependency: String },

    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    #[error("Invalid max_concurrency: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("Invalid state transition for task '{task_id}' from {from} to {to}")]
    InvalidStateTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Improvement failed: {0}")]
    ImprovementFailed(String),

    #[error("Root task '{task_id}' failed: {reason}")]
    RootTaskFailed { task_id: String, reason: String },

    #[error("Task timed out after {0:?}")]
    TaskTimedOut(Duration),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Packaging step '{step}' failed: {reason}")]
    Packaging { step: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WorkflowError {
    /// Whether this error describes a broken task-descriptor set rather than
    /// a runtime failure.
    pub const fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Cycle { .. }
                | Self::UnknownDependency { .. }
                | Self::DuplicateTask(_)
                | Self::InvalidConcurrency(_)
        )
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl From<sqlx::Error> for WorkflowError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<GenerationError> for WorkflowError {
    fn from(err: GenerationError) -> Self {
        Self::GenerationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = WorkflowError::Cycle {
            task_id: "a".to_string(),
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Task dependency cycle detected at 'a': a -> b -> a"
        );
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_generation_error_converts() {
        let err: WorkflowError = GenerationError::Permanent("bad request".to_string()).into();
        assert!(matches!(err, WorkflowError::GenerationFailed(_)));
        assert!(!err.is_configuration_error());
    }
}
