//! `docsuite tasks`

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DocumentType, Phase, Profile, TaskDescriptor};
use crate::services::{DependencyResolver, TaskCatalog};

#[derive(Args, Debug)]
pub struct TasksArgs {
    /// Which document set to inspect (defaults to workflow.default_profile)
    #[arg(short, long, value_enum)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
pub struct TaskLine {
    pub id: String,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PhasePlan {
    pub phase: u8,
    pub order: Vec<TaskLine>,
    pub waves: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TasksOutput {
    pub profile: Profile,
    pub phases: Vec<PhasePlan>,
}

impl CommandOutput for TasksOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Profile: {}", self.profile)];
        for plan in &self.phases {
            lines.push(format!("\nPhase {} ({} tasks)", plan.phase, plan.order.len()));
            for (i, task) in plan.order.iter().enumerate() {
                let gate = task
                    .quality_threshold
                    .map(|t| format!(" [gate {t:.0}]"))
                    .unwrap_or_default();
                let deps = if task.dependencies.is_empty() {
                    String::new()
                } else {
                    format!(" <- {}", task.dependencies.join(", "))
                };
                lines.push(format!("  {:>2}. {}{deps}{gate}", i + 1, task.id));
            }
            for (i, wave) in plan.waves.iter().enumerate() {
                lines.push(format!("  wave {}: {}", i + 1, wave.join(", ")));
            }
        }
        lines.join("\n")
    }
}

fn plan(
    resolver: &DependencyResolver,
    phase: Phase,
    descriptors: &[TaskDescriptor],
    upstream: &BTreeSet<DocumentType>,
) -> Result<PhasePlan> {
    let ordered = resolver
        .resolve_with_upstream(descriptors, upstream)
        .with_context(|| format!("{phase} task set is invalid"))?;
    let waves = resolver.execution_waves(descriptors, upstream)?;

    Ok(PhasePlan {
        phase: phase.number(),
        order: ordered
            .iter()
            .map(|d| TaskLine {
                id: d.id.clone(),
                dependencies: d.dependencies.iter().map(ToString::to_string).collect(),
                quality_threshold: d.quality_threshold,
            })
            .collect(),
        waves,
    })
}

/// Resolve both phases for `profile`, failing on a misconfigured catalog.
pub fn build_plan(catalog: &TaskCatalog, profile: Profile) -> Result<TasksOutput> {
    let resolver = DependencyResolver::new();
    let phase1 = catalog.phase1_tasks(profile);
    let phase1_outputs: BTreeSet<DocumentType> = phase1.iter().map(|d| d.output_type).collect();
    let phase2 = catalog.phase2_tasks(profile);

    Ok(TasksOutput {
        profile,
        phases: vec![
            plan(&resolver, Phase::Foundational, &phase1, &BTreeSet::new())?,
            plan(&resolver, Phase::Secondary, &phase2, &phase1_outputs)?,
        ],
    })
}

pub fn execute(args: &TasksArgs, config: &Config, json_mode: bool) -> Result<()> {
    let profile = args.profile.unwrap_or(config.workflow.default_profile);
    let out = build_plan(&TaskCatalog::from_config(config), profile)?;
    output(&out, json_mode);
    Ok(())
}
