//! CLI command implementations.

pub mod generate;
pub mod show;
pub mod status;
pub mod tasks;

use anyhow::{Context, Result};

use crate::application::Services;
use crate::domain::models::Config;

async fn services(config: Config) -> Result<Services> {
    Services::from_config(config)
        .await
        .context("Failed to initialize services")
}
