//! `llmsx config`: where configuration comes from and what it resolves to.

use std::path::Path;

use anyhow::Result;
use llmsx_core::Config;

/// Print the config file path in use, and whether it exists.
pub fn show_path(explicit: Option<&Path>) -> Result<()> {
    let path = Config::resolve_path(explicit, |name| std::env::var(name).ok())?;
    if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{} (not found, using defaults)", path.display());
    }
    Ok(())
}

/// Print the effective configuration as TOML.
pub fn show_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml_redacted()?);
    Ok(())
}
