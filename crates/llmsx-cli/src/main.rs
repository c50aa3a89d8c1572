//! llmsx - Turn llms.txt manifests into agent-ready documents

use std::process::ExitCode;

use colored::Colorize;
use llmsx_cli::error::exit_code_from_error;

#[tokio::main]
async fn main() -> ExitCode {
    match llmsx_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code_from_error(&err))
        },
    }
}
