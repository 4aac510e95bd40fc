//! Command-line interface.

pub mod commands;
pub mod output;
pub mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Generate a complete software documentation suite from a project idea.
#[derive(Parser, Debug)]
#[command(name = "docsuite", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to .docsuite/config.yaml and .docsuite/local.yaml)
    #[arg(short, long, global = true, env = "DOCSUITE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full three-phase workflow for a project idea
    Generate(commands::generate::GenerateArgs),
    /// Show the stored state of a run
    Status(commands::status::StatusArgs),
    /// Print one generated document
    Show(commands::show::ShowArgs),
    /// Validate and print the task graph for a profile
    Tasks(commands::tasks::TasksArgs),
}

/// Load configuration from `path`, or from the project-local files.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Report a command failure and exit with status 1.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({ "success": false, "error": format!("{err:#}") });
        eprintln!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
