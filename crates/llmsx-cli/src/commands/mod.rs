//! Command implementations for the llmsx CLI
//!
//! Each command lives in its own submodule.

mod check;
mod config;
mod extract;
pub mod serve;

pub use check::execute as check_manifest;
pub use config::{show_config, show_path as show_config_path};
pub use extract::{execute as extract, write_artifacts};
pub use serve::execute as serve;

/// Client key the one-shot commands are admitted under.
pub const LOCAL_CLIENT: &str = "local";
