//! The fetch → parse → synthesize pipeline.
//!
//! [`Extractor`] resolves a user-supplied URL to an origin, tries
//! `{origin}/llms-full.txt` and then `{origin}/llms.txt`, splits the first
//! manifest that answers into sections, and synthesizes documents from them.
//! It holds no cache and no limiter; [`crate::Service`] layers those on top.
//!
//! Each run walks the stages of [`Stage`] in order and logs every
//! transition at debug level, so a failed extraction can be traced to the
//! stage that stopped it.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AttemptFailure, FetchAttempt};
use crate::fetcher::Fetcher;
use crate::parser::{DEFAULT_SPLIT_DEPTH, SectionParser};
use crate::synth::{Document, DocumentSynthesizer};
use crate::{Error, Result};

/// Manifest filenames tried under the origin, most complete first.
pub const MANIFEST_CANDIDATES: [&str; 2] = ["llms-full.txt", "llms.txt"];

/// Pipeline stage, used for transition logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Normalizing and validating the input URL.
    ResolvingUrl,
    /// Trying manifest candidates.
    Fetching,
    /// Splitting the manifest into sections.
    Parsing,
    /// Building documents and derived artifacts.
    Synthesizing,
    /// Finished with a result.
    Complete,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolvingUrl => "resolving-url",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Synthesizing => "synthesizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// A validated input URL reduced to its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// `scheme://host[:port]`, the cache key for this site.
    pub origin: String,
}

impl ResolvedUrl {
    /// Candidate manifest URLs in the order they are tried.
    pub fn candidates(&self) -> Vec<String> {
        MANIFEST_CANDIDATES
            .iter()
            .map(|name| format!("{}/{name}", self.origin))
            .collect()
    }
}

/// Normalize user input into an http(s) origin.
///
/// Input is trimmed and `https://` is assumed when no scheme is given.
///
/// ```rust
/// use llmsx_core::resolve_url;
///
/// let resolved = resolve_url("  hono.dev/docs/getting-started ")?;
/// assert_eq!(resolved.origin, "https://hono.dev");
///
/// assert!(resolve_url("ftp://example.com").is_err());
/// # Ok::<(), llmsx_core::Error>(())
/// ```
pub fn resolve_url(input: &str) -> Result<ResolvedUrl> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("URL is empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed =
        Url::parse(&candidate).map_err(|e| Error::InvalidUrl(format!("'{trimmed}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {},
        other => {
            return Err(Error::InvalidUrl(format!(
                "'{trimmed}': unsupported scheme '{other}', expected http or https"
            )));
        },
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(format!("'{trimmed}': missing host")));
    }

    Ok(ResolvedUrl {
        origin: parsed.origin().ascii_serialization(),
    })
}

/// Counters reported alongside an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStats {
    /// Sum of document token estimates.
    pub total_tokens: usize,
    /// Number of documents produced.
    pub document_count: usize,
    /// Wall time spent producing this response.
    ///
    /// For a cache hit this is the retrieval time, not the original
    /// pipeline time.
    pub processing_time_ms: u64,
}

/// Everything produced for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Resolved origin.
    pub url: String,
    /// Manifest URL that answered.
    pub source_url: String,
    /// Manifest text as fetched.
    pub raw_content: String,
    /// Per-section documents.
    pub documents: Vec<Document>,
    /// All documents concatenated.
    pub full_document: String,
    /// Usage guide for agents.
    pub agent_guide: String,
    /// Summary counters.
    pub stats: ExtractionStats,
    /// When the manifest was fetched.
    pub fetched_at: DateTime<Utc>,
}

/// Whether a site publishes a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCheck {
    /// Resolved origin.
    pub url: String,
    /// True when one of the candidates answered.
    pub exists: bool,
    /// The candidate that answered, if any.
    pub source_url: Option<String>,
}

/// Stateless pipeline runner.
pub struct Extractor {
    fetcher: Fetcher,
    split_depth: u8,
}

impl Extractor {
    /// Create an extractor that splits at the default heading depth.
    pub const fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            split_depth: DEFAULT_SPLIT_DEPTH,
        }
    }

    /// Override the deepest heading level that starts a section.
    #[must_use]
    pub const fn with_split_depth(mut self, depth: u8) -> Self {
        self.split_depth = depth;
        self
    }

    /// Resolve `input` and run the whole pipeline.
    pub async fn extract(&self, input: &str) -> Result<ExtractionResult> {
        debug!(stage = %Stage::ResolvingUrl, input, "extraction started");
        let resolved = match resolve_url(input) {
            Ok(resolved) => resolved,
            Err(err) => {
                debug!(stage = %Stage::Failed, error = %err, "extraction failed");
                return Err(err);
            },
        };
        self.extract_resolved(&resolved).await
    }

    /// Run the pipeline for an already resolved origin.
    pub async fn extract_resolved(&self, resolved: &ResolvedUrl) -> Result<ExtractionResult> {
        let started = Instant::now();
        let outcome = self.run(resolved, started).await;
        if let Err(err) = &outcome {
            debug!(stage = %Stage::Failed, url = %resolved.origin, error = %err, "extraction failed");
        }
        outcome
    }

    async fn run(&self, resolved: &ResolvedUrl, started: Instant) -> Result<ExtractionResult> {
        debug!(stage = %Stage::Fetching, url = %resolved.origin, "fetching manifest");
        let (source_url, raw_content) = self.fetch_manifest(resolved).await?;
        let fetched_at = Utc::now();

        debug!(stage = %Stage::Parsing, %source_url, bytes = raw_content.len(), "parsing manifest");
        let sections = SectionParser::with_split_depth(self.split_depth)?.parse(&raw_content)?;
        if sections.is_empty() {
            return Err(Error::EmptyContent { url: source_url });
        }

        debug!(stage = %Stage::Synthesizing, sections = sections.len(), "synthesizing documents");
        let synthesis = DocumentSynthesizer::synthesize(&source_url, &sections);

        let stats = ExtractionStats {
            total_tokens: synthesis.total_tokens,
            document_count: synthesis.documents.len(),
            processing_time_ms: elapsed_millis(started),
        };
        debug!(
            stage = %Stage::Complete,
            documents = stats.document_count,
            tokens = stats.total_tokens,
            elapsed_ms = stats.processing_time_ms,
            "extraction complete"
        );

        Ok(ExtractionResult {
            url: resolved.origin.clone(),
            source_url,
            raw_content,
            documents: synthesis.documents,
            full_document: synthesis.full_document,
            agent_guide: synthesis.agent_guide,
            stats,
            fetched_at,
        })
    }

    /// Try each candidate in order; the first successful body wins.
    async fn fetch_manifest(&self, resolved: &ResolvedUrl) -> Result<(String, String)> {
        let mut attempts = Vec::new();

        for candidate in resolved.candidates() {
            match self.fetcher.fetch(&candidate).await {
                Ok(body) => {
                    info!(url = %candidate, attempts = attempts.len() + 1, "manifest fetched");
                    return Ok((candidate, body));
                },
                Err(err) => {
                    let failure = attempt_failure(&err);
                    warn!(url = %candidate, %failure, "manifest candidate failed, trying next");
                    attempts.push(FetchAttempt {
                        url: candidate,
                        failure,
                    });
                },
            }
        }

        Err(Error::NoManifestFound {
            url: resolved.origin.clone(),
            attempts,
        })
    }

    /// Resolve `input` and probe for a manifest without downloading it.
    pub async fn check_manifest(&self, input: &str) -> Result<ManifestCheck> {
        let resolved = resolve_url(input)?;
        self.check_resolved(&resolved).await
    }

    /// Probe the candidates of an already resolved origin.
    ///
    /// Uses HEAD, falling back to GET for servers that reject HEAD with
    /// 405 or 501. `exists: false` is only reported when every candidate
    /// answered with a non-transient status; if any attempt timed out, failed
    /// in transport or got a 5xx, the check is inconclusive and returns
    /// [`Error::NoManifestFound`] with the attempts.
    pub async fn check_resolved(&self, resolved: &ResolvedUrl) -> Result<ManifestCheck> {
        let mut attempts = Vec::new();

        for candidate in resolved.candidates() {
            match self.probe(&candidate).await {
                Ok(()) => {
                    return Ok(ManifestCheck {
                        url: resolved.origin.clone(),
                        exists: true,
                        source_url: Some(candidate),
                    });
                },
                Err(failure) => {
                    debug!(url = %candidate, %failure, "manifest probe failed");
                    attempts.push(FetchAttempt {
                        url: candidate,
                        failure,
                    });
                },
            }
        }

        if attempts.iter().any(|a| a.failure.is_transient()) {
            warn!(url = %resolved.origin, "manifest check inconclusive");
            return Err(Error::NoManifestFound {
                url: resolved.origin.clone(),
                attempts,
            });
        }

        Ok(ManifestCheck {
            url: resolved.origin.clone(),
            exists: false,
            source_url: None,
        })
    }

    async fn probe(&self, candidate: &str) -> std::result::Result<(), AttemptFailure> {
        match self.fetcher.head_status(candidate).await {
            Ok(status) if status.is_success() => Ok(()),
            Ok(status)
                if status == StatusCode::METHOD_NOT_ALLOWED
                    || status == StatusCode::NOT_IMPLEMENTED =>
            {
                warn!(%status, url = %candidate, "HEAD not supported; falling back to GET");
                self.fetcher
                    .fetch(candidate)
                    .await
                    .map(|_| ())
                    .map_err(|err| attempt_failure(&err))
            },
            Ok(status) => Err(AttemptFailure::Status {
                code: status.as_u16(),
            }),
            Err(err) => Err(attempt_failure(&err)),
        }
    }
}

fn attempt_failure(err: &Error) -> AttemptFailure {
    match err {
        Error::FetchTimeout { .. } => AttemptFailure::Timeout,
        Error::Network(e) => e.status().map_or_else(
            || AttemptFailure::Transport {
                message: e.to_string(),
            },
            |status| AttemptFailure::Status {
                code: status.as_u16(),
            },
        ),
        other => AttemptFailure::Transport {
            message: other.to_string(),
        },
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
