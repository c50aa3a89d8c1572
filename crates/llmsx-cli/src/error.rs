//! CLI error handling with semantic exit codes.
//!
//! # Exit Code Categories
//!
//! | Code | Category | Description |
//! |------|----------|-------------|
//! | 0 | Success | Command completed successfully |
//! | 1 | `Internal` | Unexpected/internal error |
//! | 2 | `Usage` | Invalid arguments, URL or configuration |
//! | 3 | `NotFound` | No manifest, or an empty one |
//! | 5 | `Network` | Network or fetch failure |
//! | 6 | `Timeout` | Operation timed out |
//! | 7 | `RateLimited` | Admission denied by the rate limiter |
//!
//! ```bash
//! llmsx extract hono.dev --out ./docs
//! case $? in
//!     0) echo "done" ;;
//!     3) echo "no llms.txt published" ;;
//!     *) echo "other error" ;;
//! esac
//! ```

use std::fmt;
use std::process::ExitCode;

/// Semantic error category determining the exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Unexpected or internal error (exit code 1).
    Internal = 1,
    /// Invalid arguments, URL or configuration (exit code 2).
    Usage = 2,
    /// No manifest, or a manifest without content (exit code 3).
    NotFound = 3,
    /// Network or fetch failure (exit code 5).
    Network = 5,
    /// Operation timed out (exit code 6).
    Timeout = 6,
    /// Admission denied (exit code 7).
    RateLimited = 7,
}

impl ErrorCategory {
    /// Get the exit code for this category.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        self as u8
    }

    /// Create an `ExitCode` from this category.
    #[must_use]
    pub fn as_exit_code(self) -> ExitCode {
        ExitCode::from(self.exit_code())
    }

    /// Get a short description of this error category.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Internal => "internal error",
            Self::Usage => "usage error",
            Self::NotFound => "not found",
            Self::Network => "network error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate limited",
        }
    }

    /// Category for a core error.
    ///
    /// A missing manifest is only `NotFound` when every attempt failed
    /// definitively; a timed out attempt makes it `Timeout`, any other
    /// transient failure `Network`.
    #[must_use]
    pub fn from_core(err: &llmsx_core::Error) -> Self {
        use llmsx_core::{AttemptFailure, Error};

        match err {
            Error::InvalidUrl(_) | Error::Config(_) => Self::Usage,
            Error::NoManifestFound { attempts, .. } => {
                if attempts.iter().any(|a| a.failure == AttemptFailure::Timeout) {
                    Self::Timeout
                } else if attempts.iter().any(|a| a.failure.is_transient()) {
                    Self::Network
                } else {
                    Self::NotFound
                }
            },
            Error::EmptyContent { .. } => Self::NotFound,
            Error::Network(_) => Self::Network,
            Error::FetchTimeout { .. } => Self::Timeout,
            Error::RateLimited { .. } => Self::RateLimited,
            Error::Io(_) | Error::Parse(_) | Error::Serialization(_) => Self::Internal,
        }
    }

    /// Infer the error category from an error message.
    ///
    /// Fallback for errors that are neither a [`CliError`] nor a core error.
    #[must_use]
    pub fn infer_from_message(msg: &str) -> Self {
        let msg_lower = msg.to_lowercase();

        // Timeout first so "connection timeout" is not classed as network
        if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            return Self::Timeout;
        }

        if msg_lower.contains("network")
            || msg_lower.contains("connection")
            || msg_lower.contains("dns")
            || msg_lower.contains("http")
        {
            return Self::Network;
        }

        if msg_lower.contains("not found")
            || msg_lower.contains("no such")
            || msg_lower.contains("does not exist")
        {
            return Self::NotFound;
        }

        if msg_lower.contains("rate limit") {
            return Self::RateLimited;
        }

        if msg_lower.contains("invalid argument")
            || msg_lower.contains("invalid value")
            || msg_lower.contains("configuration")
        {
            return Self::Usage;
        }

        Self::Internal
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A CLI error with a semantic category for exit code mapping.
#[derive(Debug)]
pub struct CliError {
    /// The semantic category of this error.
    pub category: ErrorCategory,
    /// The underlying error with full context.
    pub source: anyhow::Error,
}

impl CliError {
    /// Create a new CLI error with explicit category.
    pub fn new(category: ErrorCategory, source: impl Into<anyhow::Error>) -> Self {
        Self {
            category,
            source: source.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Usage, source)
    }

    /// Create a not-found error.
    pub fn not_found(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::NotFound, source)
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.category.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Determine the exit code from an `anyhow::Error`.
///
/// An explicit [`CliError`] wins, then the first core error in the chain,
/// then message inference.
#[must_use]
pub fn exit_code_from_error(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }

    for cause in err.chain() {
        if let Some(core) = cause.downcast_ref::<llmsx_core::Error>() {
            return ErrorCategory::from_core(core).exit_code();
        }
    }

    ErrorCategory::infer_from_message(&err.to_string()).exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorCategory::Internal.exit_code(), 1);
        assert_eq!(ErrorCategory::Usage.exit_code(), 2);
        assert_eq!(ErrorCategory::NotFound.exit_code(), 3);
        assert_eq!(ErrorCategory::Network.exit_code(), 5);
        assert_eq!(ErrorCategory::Timeout.exit_code(), 6);
        assert_eq!(ErrorCategory::RateLimited.exit_code(), 7);
    }

    #[test]
    fn test_core_errors_map_to_categories() {
        use llmsx_core::Error;

        let cases = [
            (Error::InvalidUrl("x".into()), ErrorCategory::Usage),
            (Error::Config("zero".into()), ErrorCategory::Usage),
            (
                Error::NoManifestFound {
                    url: "https://a.dev".into(),
                    attempts: Vec::new(),
                },
                ErrorCategory::NotFound,
            ),
            (
                Error::EmptyContent {
                    url: "https://a.dev/llms.txt".into(),
                },
                ErrorCategory::NotFound,
            ),
            (
                Error::FetchTimeout {
                    url: "https://a.dev".into(),
                },
                ErrorCategory::Timeout,
            ),
            (
                Error::RateLimited {
                    client: "local".into(),
                    remaining: 0,
                    reset_after: Duration::from_secs(1),
                },
                ErrorCategory::RateLimited,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ErrorCategory::from_core(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_missing_manifest_category_follows_attempts() {
        use llmsx_core::{AttemptFailure, Error, FetchAttempt};

        let missing = |failures: Vec<AttemptFailure>| Error::NoManifestFound {
            url: "https://a.dev".into(),
            attempts: failures
                .into_iter()
                .map(|failure| FetchAttempt {
                    url: "https://a.dev/llms.txt".into(),
                    failure,
                })
                .collect(),
        };

        let cases = [
            (
                vec![AttemptFailure::Status { code: 404 }, AttemptFailure::Status { code: 410 }],
                ErrorCategory::NotFound,
            ),
            (
                vec![AttemptFailure::Status { code: 404 }, AttemptFailure::Timeout],
                ErrorCategory::Timeout,
            ),
            (
                vec![
                    AttemptFailure::Transport {
                        message: "connection refused".into(),
                    },
                    AttemptFailure::Status { code: 404 },
                ],
                ErrorCategory::Network,
            ),
            (vec![AttemptFailure::Status { code: 502 }], ErrorCategory::Network),
        ];

        for (failures, expected) in cases {
            let err = missing(failures);
            assert_eq!(ErrorCategory::from_core(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_exit_code_sees_core_error_through_context() {
        let err = Err::<(), _>(llmsx_core::Error::InvalidUrl("ftp://x".into()))
            .context("extract failed")
            .unwrap_err();
        assert_eq!(exit_code_from_error(&err), 2);
    }

    #[test]
    fn test_cli_error_wins() {
        let err = anyhow::Error::new(CliError::not_found(anyhow!("missing")));
        assert_eq!(exit_code_from_error(&err), 3);
    }

    #[test]
    fn test_infer_from_message() {
        assert_eq!(
            ErrorCategory::infer_from_message("Request timeout after 30s"),
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorCategory::infer_from_message("Connection refused"),
            ErrorCategory::Network
        );
        assert_eq!(
            ErrorCategory::infer_from_message("something odd"),
            ErrorCategory::Internal
        );
    }
}
