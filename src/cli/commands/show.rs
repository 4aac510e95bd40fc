//! `docsuite show`

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Artifact, Config, DocumentType};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Project id printed by `generate`
    pub project_id: String,

    /// Document type, e.g. `requirements` or `api_documentation`
    pub document_type: String,
}

#[derive(Debug, Serialize)]
pub struct ShowOutput {
    pub project_id: String,
    pub artifact: Artifact,
}

impl CommandOutput for ShowOutput {
    fn to_human(&self) -> String {
        self.artifact.content.clone()
    }
}

pub async fn execute(args: ShowArgs, config: Config, json_mode: bool) -> Result<()> {
    let document_type: DocumentType = args
        .document_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let services = super::services(config).await?;
    let artifact = services
        .store
        .get_artifact(&args.project_id, document_type)
        .await
        .context("Failed to load document")?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No {} document stored for project {}",
                document_type.display_name(),
                args.project_id
            )
        })?;

    output(
        &ShowOutput {
            project_id: args.project_id,
            artifact,
        },
        json_mode,
    );
    Ok(())
}
