//! `docsuite status`

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets, Cell, ContentArrangement, Table};
use serde::Serialize;

use crate::cli::output::{format_duration_ms, output, truncate, CommandOutput};
use crate::domain::models::{Config, DocumentType, WorkflowRun};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project id printed by `generate`
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub run: WorkflowRun,
}

impl StatusOutput {
    fn task_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["TASK", "STATUS", "DURATION", "SCORE", "REV", "DETAIL"]);

        for (task_id, execution) in &self.run.task_statuses {
            let artifact = task_id
                .parse::<DocumentType>()
                .ok()
                .and_then(|t| self.run.phase_results.get(&t));
            let score = artifact
                .and_then(|a| a.quality_score)
                .map_or_else(String::new, |s| format!("{s:.1}"));
            let revision = artifact.map_or_else(String::new, |a| format!("v{}", a.revision + 1));
            let duration = execution
                .duration_ms()
                .and_then(|ms| u64::try_from(ms).ok())
                .map_or_else(String::new, format_duration_ms);
            let detail = execution
                .failure_reason()
                .map(|r| truncate(&r, 60))
                .unwrap_or_default();

            table.add_row(vec![
                Cell::new(task_id),
                Cell::new(execution.status),
                Cell::new(duration),
                Cell::new(score),
                Cell::new(revision),
                Cell::new(detail),
            ]);
        }
        table
    }
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let run = &self.run;
        let summary = run.summary();
        let mut lines = vec![
            format!("Project: {}", run.project_id),
            format!("Idea: {}", truncate(&run.user_idea, 80)),
            format!("Profile: {}", run.profile),
            format!("Status: {}", run.status),
            format!("Started: {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ];
        if let Some(finished) = run.finished_at {
            lines.push(format!(
                "Finished: {}",
                finished.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        if let Some(error) = &run.error {
            lines.push(format!("Error: {error}"));
        }
        lines.push(format!(
            "{} of {} documents generated",
            summary.generated, summary.scheduled
        ));

        for phase in &run.phases {
            lines.push(format!(
                "  {}: {} complete, {} failed, {} blocked in {}",
                phase.phase,
                phase.completed,
                phase.failed,
                phase.blocked,
                format_duration_ms(phase.duration_ms)
            ));
        }
        if !run.task_statuses.is_empty() {
            lines.push(String::new());
            lines.push(self.task_table().to_string());
        }
        for outcome in &run.packaging {
            let result = outcome
                .error
                .as_deref()
                .map_or_else(|| "ok".to_string(), |e| format!("failed: {e}"));
            lines.push(format!("packaging {}: {result}", outcome.step));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: StatusArgs, config: Config, json_mode: bool) -> Result<()> {
    let services = super::services(config).await?;
    let run = services
        .coordinator()
        .get_status(&args.project_id)
        .await
        .context("Failed to load run")?
        .ok_or_else(|| anyhow::anyhow!("No run found for project {}", args.project_id))?;

    output(&StatusOutput { run }, json_mode);
    Ok(())
}
