//! # CLI Structure and Argument Parsing
//!
//! ```bash
//! # One-shot extraction into a directory
//! llmsx extract hono.dev --out ./hono-docs
//!
//! # Does a site publish a manifest?
//! llmsx check https://bun.sh --format json
//!
//! # Long-running JSON-lines server on stdio
//! llmsx serve
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::FormatArg;

/// Main CLI structure for the `llmsx` command
#[derive(Parser, Clone, Debug)]
#[command(name = "llmsx")]
#[command(version)]
#[command(about = "llmsx - Turn llms.txt manifests into agent-ready documents", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with_all = ["verbose", "debug"])]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file (overrides `LLMSX_CONFIG`)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch a site's manifest and split it into documents
    Extract {
        /// Site URL or host (https:// is assumed)
        url: String,

        /// Directory to write documents, `llms-full.md` and `AGENT_GUIDE.md` into
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Check whether a site publishes llms-full.txt or llms.txt
    Check {
        /// Site URL or host (https:// is assumed)
        url: String,

        #[command(flatten)]
        format: FormatArg,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Serve extraction and admin requests as JSON lines over stdin/stdout
    Serve,
}

/// `llmsx config` subcommands
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the config file path in use
    Path,
    /// Print the effective configuration (file plus environment)
    Show,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_arguments() {
        let cli = Cli::try_parse_from([
            "llmsx", "--debug", "extract", "hono.dev", "--out", "docs", "-f", "json",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        assert!(cli.debug);
        match cli.command {
            Commands::Extract { url, out, format } => {
                assert_eq!(url, "hono.dev");
                assert_eq!(out, Some(PathBuf::from("docs")));
                assert_eq!(format.format, Some(OutputFormat::Json));
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["llmsx", "config", "path", "--config", "/tmp/x.toml"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Path
            }
        ));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["llmsx", "-q", "-v", "serve"]).is_err());
    }
}
