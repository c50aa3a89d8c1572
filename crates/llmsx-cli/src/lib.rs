//! llmsx CLI library
//!
//! Argument parsing, command dispatch and exit-code mapping for the
//! `llmsx` binary. The binary in `main.rs` only calls [`run`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;

use anyhow::Result;
use clap::Parser;
use llmsx_core::{Config, Service};

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::error::CliError;

/// Parse arguments, initialize logging and run the selected command.
///
/// # Errors
///
/// Returns the command's error; [`error::exit_code_from_error`] maps it to
/// an exit code.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(&cli)?;
    execute(cli).await
}

async fn execute(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();

    // `config path` must work even when the file does not load.
    if matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommands::Path
        }
    ) {
        return commands::show_config_path(explicit);
    }

    let config = Config::load(explicit).map_err(CliError::usage)?;

    match cli.command {
        Commands::Extract { url, out, format } => {
            let service = Service::new(config)?;
            commands::extract(&service, &url, out.as_deref(), format.resolve()).await
        },
        Commands::Check { url, format } => {
            let service = Service::new(config)?;
            commands::check_manifest(&service, &url, format.resolve()).await
        },
        Commands::Config { .. } => commands::show_config(&config),
        Commands::Serve => commands::serve(config).await,
    }
}
