//! `docsuite generate`

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::output::{output, CommandOutput};
use crate::cli::progress::spawn_progress;
use crate::domain::models::{Config, Profile, RunStatus, WorkflowRun};
use crate::services::new_project_id;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Project idea, in plain language
    pub idea: String,

    /// Which document set to produce (defaults to workflow.default_profile)
    #[arg(short, long, value_enum)]
    pub profile: Option<Profile>,

    /// Use this project id instead of a generated one
    #[arg(long)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PackagingLine {
    pub step: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FailureLine {
    pub task_id: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateOutput {
    pub project_id: String,
    pub status: RunStatus,
    pub generated: usize,
    pub scheduled: usize,
    pub success_rate: f64,
    pub failures: Vec<FailureLine>,
    pub packaging: Vec<PackagingLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&WorkflowRun> for GenerateOutput {
    fn from(run: &WorkflowRun) -> Self {
        let summary = run.summary();
        Self {
            project_id: run.project_id.clone(),
            status: run.status,
            generated: summary.generated,
            scheduled: summary.scheduled,
            success_rate: summary.success_rate(),
            failures: summary
                .failures
                .into_iter()
                .map(|(task_id, reason)| FailureLine { task_id, reason })
                .collect(),
            packaging: run
                .packaging
                .iter()
                .map(|o| PackagingLine {
                    step: o.step.clone(),
                    success: o.success,
                    error: o.error.clone(),
                })
                .collect(),
            error: run.error.clone(),
        }
    }
}

impl CommandOutput for GenerateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Project: {}", self.project_id),
            format!("Status: {}", self.status),
            format!(
                "{} of {} documents generated ({:.0}%)",
                self.generated,
                self.scheduled,
                self.success_rate * 100.0
            ),
        ];
        if let Some(error) = &self.error {
            lines.push(format!("Aborted: {error}"));
        }
        if !self.failures.is_empty() {
            lines.push("\nNot generated:".to_string());
            for failure in &self.failures {
                lines.push(format!("  - {}: {}", failure.task_id, failure.reason));
            }
        }
        if !self.packaging.is_empty() {
            lines.push("\nPackaging:".to_string());
            for step in &self.packaging {
                let result = step
                    .error
                    .as_deref()
                    .map_or_else(|| "ok".to_string(), |e| format!("failed: {e}"));
                lines.push(format!("  - {}: {result}", step.step));
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(args: GenerateArgs, config: Config, json_mode: bool) -> Result<()> {
    let profile = args.profile.unwrap_or(config.workflow.default_profile);
    let project_id = args.project_id.unwrap_or_else(new_project_id);
    let services = super::services(config).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = (!json_mode).then(|| spawn_progress(rx));
    let coordinator = services.coordinator().with_events(tx);

    let result = coordinator
        .generate_all_docs_for(&project_id, &args.idea, profile)
        .await;
    // Closing the channel lets the spinner finish.
    drop(coordinator);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    let run = result.context("Workflow failed")?;
    output(&GenerateOutput::from(&run), json_mode);

    if run.is_aborted() {
        run.ensure_not_aborted()
            .context("Workflow aborted after phase 1")?;
    }
    Ok(())
}
