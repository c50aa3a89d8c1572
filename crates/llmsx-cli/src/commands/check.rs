//! `llmsx check`: does a site publish a manifest?

use anyhow::{Result, anyhow};
use colored::Colorize;
use llmsx_core::Service;

use super::LOCAL_CLIENT;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Print the manifest check for `url`; a missing manifest exits 3.
pub async fn execute(service: &Service, url: &str, format: OutputFormat) -> Result<()> {
    let check = service.check_manifest(LOCAL_CLIENT, url).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&check)?),
        OutputFormat::Text => match &check.source_url {
            Some(source) if check.exists => {
                println!("{} {} publishes {}", "✓".green(), check.url, source.cyan());
            },
            _ => println!("{} {} publishes no llms.txt manifest", "✗".red(), check.url),
        },
    }

    if !check.exists {
        return Err(CliError::not_found(anyhow!("No manifest found for {}", check.url)).into());
    }
    Ok(())
}
