#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(15);

const OVERRIDES: &[&str] = &[
    "LLMSX_CACHE_TTL_MS",
    "LLMSX_CACHE_MAX_SIZE",
    "LLMSX_VALIDATION_TTL_MS",
    "LLMSX_VALIDATION_MAX_SIZE",
    "LLMSX_RATE_LIMIT",
    "LLMSX_RATE_WINDOW_MS",
    "LLMSX_FETCH_TIMEOUT_MS",
    "LLMSX_ADMIN_KEY",
    "LLMSX_OUTPUT_FORMAT",
];

fn config_dir() -> &'static Path {
    static CONFIG_DIR: OnceLock<TempDir> = OnceLock::new();
    CONFIG_DIR
        .get_or_init(|| tempfile::tempdir().expect("failed to create config dir for tests"))
        .path()
}

/// Create an `llmsx` command isolated from the caller's config and env.
///
/// `LLMSX_CONFIG` points at a file that does not exist, so defaults apply
/// unless a test passes `--config` or sets overrides itself.
#[allow(dead_code)]
pub fn llmsx_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("llmsx"));
    cmd.timeout(CMD_TIMEOUT);
    for name in OVERRIDES {
        cmd.env_remove(name);
    }
    cmd.env("LLMSX_CONFIG", config_dir().join("absent.toml"));
    cmd.env("NO_COLOR", "1");
    cmd
}

/// Write `contents` to `config.toml` under `dir` and return its path.
#[allow(dead_code)]
pub fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}
