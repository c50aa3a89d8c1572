//! Configuration for the extraction service.
//!
//! Settings are read from a TOML file and then overridden by `LLMSX_*`
//! environment variables. A missing file means defaults.
//!
//! ## Configuration Sources
//!
//! 1. **Defaults**: [`Config::default`]
//! 2. **File**: `--config <PATH>`, else `LLMSX_CONFIG`, else
//!    `<config dir>/llmsx/config.toml`
//! 3. **Environment variables**: see [`ENV_OVERRIDES`]
//!
//! ## Example Configuration File
//!
//! ```toml
//! [cache.extraction]
//! ttl_ms = 3600000
//! max_size = 100
//!
//! [cache.validation]
//! ttl_ms = 300000
//! max_size = 1000
//!
//! [rate_limit]
//! limit = 10
//! window_ms = 60000
//!
//! [fetch]
//! timeout_ms = 10000
//!
//! [maintenance]
//! prune_interval_ms = 60000
//!
//! [admin]
//! key = "change-me"
//! ```
//!
//! ```rust
//! use llmsx_core::Config;
//!
//! let mut config: Config = toml::from_str("[rate_limit]\nlimit = 3\n")?;
//! config.apply_overrides(|name| (name == "LLMSX_FETCH_TIMEOUT_MS").then(|| "2500".to_string()))?;
//!
//! assert_eq!(config.rate_limit.limit, 3);
//! assert_eq!(config.rate_limit.window_ms, 60_000);
//! assert_eq!(config.fetch.timeout_ms, 2_500);
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "LLMSX_CONFIG";

/// Every environment variable [`Config::apply_overrides`] consults.
pub const ENV_OVERRIDES: [&str; 8] = [
    "LLMSX_CACHE_TTL_MS",
    "LLMSX_CACHE_MAX_SIZE",
    "LLMSX_VALIDATION_TTL_MS",
    "LLMSX_VALIDATION_MAX_SIZE",
    "LLMSX_RATE_LIMIT",
    "LLMSX_RATE_WINDOW_MS",
    "LLMSX_FETCH_TIMEOUT_MS",
    "LLMSX_ADMIN_KEY",
];

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache namespaces
    pub cache: CacheConfig,
    /// Per-client admission control
    pub rate_limit: RateLimitConfig,
    /// Outbound HTTP
    pub fetch: FetchConfig,
    /// Background pruning
    pub maintenance: MaintenanceConfig,
    /// Admin surface access
    pub admin: AdminConfig,
}

/// Settings for both cache namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Extraction results, keyed by origin.
    pub extraction: NamespaceConfig,
    /// Manifest existence flags.
    pub validation: NamespaceConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            extraction: NamespaceConfig {
                ttl_ms: 60 * 60 * 1000,
                max_size: 100,
            },
            validation: NamespaceConfig {
                ttl_ms: 5 * 60 * 1000,
                max_size: 1000,
            },
        }
    }
}

/// TTL and soft size cap for one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Entry lifetime in milliseconds.
    pub ttl_ms: u64,
    /// Entries held before eviction kicks in.
    pub max_size: usize,
}

impl NamespaceConfig {
    /// Entry lifetime.
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Fixed-window admission limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per window and client.
    pub limit: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window_ms: 60 * 1000,
        }
    }
}

impl RateLimitConfig {
    /// Window length.
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl FetchConfig {
    /// Per-attempt timeout.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Background maintenance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// How often long-running servers prune caches and limiter records.
    pub prune_interval_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            prune_interval_ms: 60 * 1000,
        }
    }
}

impl MaintenanceConfig {
    /// Prune interval.
    pub const fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }
}

/// Admin surface access. The core never checks the key; front ends do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Shared secret for admin operations; `None` leaves them open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Config {
    /// Load from the resolved path, apply environment overrides, validate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed, an
    /// override does not parse, or a value is zero.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();
        let path = Self::resolve_path(explicit, lookup)?;
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Where the config file is read from.
    ///
    /// Precedence: `explicit`, then the `LLMSX_CONFIG` variable, then the
    /// platform config directory (`~/.config/llmsx/config.toml` on Linux).
    pub fn resolve_path<F>(explicit: Option<&Path>, lookup: F) -> Result<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = lookup(CONFIG_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let base = directories::BaseDirs::new()
            .ok_or_else(|| Error::Config("Failed to determine config directory".into()))?;
        Ok(base.config_dir().join("llmsx").join("config.toml"))
    }

    /// Read `path`, or return defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Apply `LLMSX_*` overrides fetched through `lookup`.
    ///
    /// `lookup` is usually `std::env::var(..).ok()`; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_number(&lookup, "LLMSX_CACHE_TTL_MS", &mut self.cache.extraction.ttl_ms)?;
        override_number(&lookup, "LLMSX_CACHE_MAX_SIZE", &mut self.cache.extraction.max_size)?;
        override_number(&lookup, "LLMSX_VALIDATION_TTL_MS", &mut self.cache.validation.ttl_ms)?;
        override_number(
            &lookup,
            "LLMSX_VALIDATION_MAX_SIZE",
            &mut self.cache.validation.max_size,
        )?;
        override_number(&lookup, "LLMSX_RATE_LIMIT", &mut self.rate_limit.limit)?;
        override_number(&lookup, "LLMSX_RATE_WINDOW_MS", &mut self.rate_limit.window_ms)?;
        override_number(&lookup, "LLMSX_FETCH_TIMEOUT_MS", &mut self.fetch.timeout_ms)?;

        if let Some(key) = lookup("LLMSX_ADMIN_KEY") {
            let key = key.trim();
            self.admin.key = (!key.is_empty()).then(|| key.to_string());
        }
        Ok(())
    }

    /// Reject zero TTLs, sizes, limits, windows, timeouts and intervals.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("cache.extraction.ttl_ms", self.cache.extraction.ttl_ms == 0),
            ("cache.extraction.max_size", self.cache.extraction.max_size == 0),
            ("cache.validation.ttl_ms", self.cache.validation.ttl_ms == 0),
            ("cache.validation.max_size", self.cache.validation.max_size == 0),
            ("rate_limit.limit", self.rate_limit.limit == 0),
            ("rate_limit.window_ms", self.rate_limit.window_ms == 0),
            ("fetch.timeout_ms", self.fetch.timeout_ms == 0),
            (
                "maintenance.prune_interval_ms",
                self.maintenance.prune_interval_ms == 0,
            ),
        ];

        match checks.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(Error::Config(format!("{field} must be greater than zero"))),
            None => Ok(()),
        }
    }

    /// Render as pretty TOML (the admin key is masked).
    pub fn to_toml_redacted(&self) -> Result<String> {
        let mut shown = self.clone();
        if shown.admin.key.is_some() {
            shown.admin.key = Some("********".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

fn override_number<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(());
    };
    *target = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={raw:?} is not a valid number: {e}")))?;
    debug!(name, value = raw.trim(), "applied environment override");
    Ok(())
}
