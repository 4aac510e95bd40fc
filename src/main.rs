//! docsuite CLI entry point.

use clap::Parser;

use docsuite::cli::{commands, handle_error, load_config, Cli, Commands};
use docsuite::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(&err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, config, cli.json).await,
        Commands::Show(args) => commands::show::execute(args, config, cli.json).await,
        Commands::Tasks(args) => commands::tasks::execute(&args, &config, cli.json),
    };

    if let Err(err) = result {
        handle_error(&err, cli.json);
    }
}
