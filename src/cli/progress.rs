//! Spinner fed by workflow events.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::RunStatus;
use crate::services::{ExecutionEvent, WorkflowEvent};

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// One-line description of an event, or `None` for events not worth showing.
pub fn describe(event: &WorkflowEvent) -> Option<String> {
    match event {
        WorkflowEvent::PhaseStarted { phase, task_count } => {
            Some(format!("{phase}: {task_count} tasks"))
        }
        WorkflowEvent::Task { phase, event } => Some(match event {
            ExecutionEvent::TaskStarted { task_id } => {
                format!("phase {}: generating {task_id}", phase.number())
            }
            ExecutionEvent::TaskCompleted {
                task_id,
                duration_ms,
            } => format!("phase {}: {task_id} done in {duration_ms}ms", phase.number()),
            ExecutionEvent::TaskFailed { task_id, error } => {
                format!("phase {}: {task_id} failed: {error}", phase.number())
            }
            ExecutionEvent::TaskBlocked {
                task_id,
                blocked_by,
            } => format!(
                "phase {}: {task_id} blocked by {}",
                phase.number(),
                blocked_by.join(", ")
            ),
        }),
        WorkflowEvent::PhaseCompleted { summary } => Some(format!(
            "{}: {}/{} complete",
            summary.phase, summary.completed, summary.total
        )),
        WorkflowEvent::PackagingStep { outcome } => Some(if outcome.success {
            format!("packaging: {} done", outcome.step)
        } else {
            format!("packaging: {} failed", outcome.step)
        }),
        WorkflowEvent::RunFinished { .. } => None,
    }
}

/// Drive a spinner until the event channel closes.
///
/// Failures and blocks are printed above the spinner so they stay visible.
pub fn spawn_progress(mut rx: mpsc::UnboundedReceiver<WorkflowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = create_spinner();
        spinner.set_message("starting");
        while let Some(event) = rx.recv().await {
            match &event {
                WorkflowEvent::RunFinished { status, .. } => {
                    let mark = if *status == RunStatus::Completed { "✓" } else { "!" };
                    spinner.finish_with_message(format!("{mark} run {status}"));
                }
                WorkflowEvent::Task {
                    event: ExecutionEvent::TaskFailed { .. } | ExecutionEvent::TaskBlocked { .. },
                    ..
                } => {
                    if let Some(line) = describe(&event) {
                        spinner.println(line);
                    }
                }
                other => {
                    if let Some(line) = describe(other) {
                        spinner.set_message(line);
                    }
                }
            }
        }
        if !spinner.is_finished() {
            spinner.finish_and_clear();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Phase;

    #[test]
    fn test_describe_task_events() {
        let event = WorkflowEvent::Task {
            phase: Phase::Secondary,
            event: ExecutionEvent::TaskBlocked {
                task_id: "setup_guide".to_string(),
                blocked_by: vec!["api_documentation".to_string()],
            },
        };
        assert_eq!(
            describe(&event).unwrap(),
            "phase 2: setup_guide blocked by api_documentation"
        );
        assert!(describe(&WorkflowEvent::RunFinished {
            project_id: "p".to_string(),
            status: RunStatus::Completed,
        })
        .is_none());
    }
}
