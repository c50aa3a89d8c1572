//! Error types and handling for llmsx-core operations.
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Terminal
//! failures of the extraction pipeline are structured values, never panics,
//! so callers (the CLI, a stdio server, an HTTP layer) can map them onto
//! their own status codes.
//!
//! ## Error Categories
//!
//! - **Input**: [`Error::InvalidUrl`]
//! - **Fetching**: [`Error::NoManifestFound`], [`Error::FetchTimeout`], [`Error::Network`]
//! - **Content**: [`Error::EmptyContent`], [`Error::Parse`]
//! - **Admission**: [`Error::RateLimited`]
//! - **Setup**: [`Error::Config`], [`Error::Io`], [`Error::Serialization`]
//!
//! ```rust
//! use llmsx_core::Error;
//! use std::time::Duration;
//!
//! let err = Error::RateLimited {
//!     client: "203.0.113.7".to_string(),
//!     remaining: 0,
//!     reset_after: Duration::from_secs(12),
//! };
//! assert_eq!(err.category(), "rate_limited");
//! assert!(err.is_recoverable());
//! ```

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// The main error type for llmsx-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed (config files, artifact output).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or transport failed outside a fetch attempt.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Input could not be resolved to an `http`/`https` URL.
    ///
    /// Never retried; the caller must fix the input.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Neither `llms-full.txt` nor `llms.txt` could be fetched.
    ///
    /// Each candidate attempt is recorded so callers can explain what
    /// happened (404 versus timeout versus connection refused).
    #[error("No llms.txt manifest found for '{url}' ({})", AttemptList(.attempts))]
    NoManifestFound {
        /// Resolved origin the candidates were derived from.
        url: String,
        /// One entry per candidate URL, in the order tried.
        attempts: Vec<FetchAttempt>,
    },

    /// The manifest was fetched but contained no parseable sections.
    #[error("Manifest at '{url}' has no content")]
    EmptyContent {
        /// URL the empty manifest was fetched from.
        url: String,
    },

    /// A single fetch attempt exceeded its timeout.
    ///
    /// The orchestrator folds this into [`Error::NoManifestFound`] once all
    /// candidates are exhausted; it only surfaces directly from
    /// [`crate::Fetcher`].
    #[error("Timed out fetching '{url}'")]
    FetchTimeout {
        /// URL that timed out.
        url: String,
    },

    /// Admission denied by the rate limiter.
    #[error("Rate limit exceeded for '{client}', retry in {}ms", .reset_after.as_millis())]
    RateLimited {
        /// Client key that was denied.
        client: String,
        /// Requests left in the window (always 0 when denied).
        remaining: u32,
        /// Time until the window resets.
        reset_after: Duration,
    },

    /// Markdown parsing failed (grammar could not be loaded or parse aborted).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// Zero TTLs, sizes, limits, or windows are rejected at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outcome of one candidate fetch that did not produce a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAttempt {
    /// Candidate URL.
    pub url: String,
    /// Why the candidate was rejected.
    pub failure: AttemptFailure,
}

/// Reason a candidate fetch was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AttemptFailure {
    /// Server answered with a non-success status.
    Status {
        /// HTTP status code.
        code: u16,
    },
    /// The attempt exceeded the fetch timeout.
    Timeout,
    /// Transport or body decoding error.
    Transport {
        /// Error description.
        message: String,
    },
}

impl AttemptFailure {
    /// Whether a retry could succeed: timeouts, transport errors and 5xx.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Status { code } => *code >= 500,
            Self::Timeout | Self::Transport { .. } => true,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code } => write!(f, "HTTP {code}"),
            Self::Timeout => f.write_str("timeout"),
            Self::Transport { message } => f.write_str(message),
        }
    }
}

struct AttemptList<'a>(&'a [FetchAttempt]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no candidates tried");
        }
        for (idx, attempt) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", attempt.url, attempt.failure)?;
        }
        Ok(())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might clear up if the caller retries later.
    ///
    /// `NoManifestFound` is recoverable only when at least one attempt
    /// failed for a transient reason (timeout, transport, 5xx); a pair of
    /// 404s will not fix itself.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::FetchTimeout { .. } | Self::RateLimited { .. } => true,
            Self::NoManifestFound { attempts, .. } => {
                attempts.iter().any(|a| a.failure.is_transient())
            },
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a stable string identifier.
    ///
    /// Used as the `category` field of structured error responses and for
    /// grouping in logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::InvalidUrl(_) => "invalid_url",
            Self::NoManifestFound { .. } => "no_manifest_found",
            Self::EmptyContent { .. } => "empty_content",
            Self::FetchTimeout { .. } => "fetch_timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
