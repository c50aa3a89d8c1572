//! # llmsx-core
//!
//! Core functionality for llmsx: turn a site's `llms.txt` manifest into
//! agent-ready documents, behind a TTL cache and a per-client rate limiter.
//!
//! ## Architecture
//!
//! - **Pipeline**: [`Extractor`] fetches `llms-full.txt` or `llms.txt`,
//!   [`SectionParser`] splits it by heading, [`DocumentSynthesizer`] builds
//!   per-section documents, a concatenated document and an agent guide
//! - **Protection**: [`TtlCache`] namespaces and a fixed-window [`RateLimiter`]
//! - **Operations**: [`AdminSurface`] aggregates statistics and runs clear/prune
//! - **Lifecycle**: [`Service`] owns all of the above and implements the
//!   request flow
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llmsx_core::{Config, Service};
//!
//! # async fn run() -> llmsx_core::Result<()> {
//! let service = Service::new(Config::load(None)?)?;
//! let result = service.extract("127.0.0.1", "hono.dev").await?;
//!
//! println!("{} documents from {}", result.documents.len(), result.source_url);
//! println!("{}", service.admin().snapshot().await.cache["extraction"].size);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. Pipeline failures are
//! structured values:
//!
//! ```rust
//! use llmsx_core::{Error, SectionParser};
//!
//! let mut parser = SectionParser::new()?;
//! match parser.parse("   ") {
//!     Ok(sections) if sections.is_empty() => println!("nothing to extract"),
//!     Ok(sections) => println!("{} sections", sections.len()),
//!     Err(e) if e.is_recoverable() => eprintln!("Recoverable error: {e}"),
//!     Err(e) => eprintln!("Fatal error: {e}"),
//! }
//! # Ok::<(), Error>(())
//! ```

/// Read-only statistics and maintenance over caches and the limiter
pub mod admin;
/// Time-bounded cache namespaces
pub mod cache;
/// Monotonic clocks
pub mod clock;
/// File and environment configuration
pub mod config;
/// Error types and result aliases
pub mod error;
/// Fetch, parse and synthesize pipeline
pub mod extract;
/// HTTP client for manifests
pub mod fetcher;
/// Heading cleanup and slugs
pub mod heading;
/// Tree-sitter based section splitting
pub mod parser;
/// Per-client fixed-window admission
pub mod rate_limit;
/// Lifecycle-owning service context
pub mod service;
/// Document synthesis
pub mod synth;

// Re-export commonly used types
pub use admin::{AdminSurface, CacheNamespace, ClearReport, ClearScope, PruneReport, ServiceSnapshot};
pub use cache::{CacheStats, EntryInfo, TtlCache};
pub use clock::{Clock, ManualClock, Millis, SharedClock, SystemClock};
pub use config::{
    AdminConfig, CacheConfig, Config, FetchConfig, MaintenanceConfig, NamespaceConfig,
    RateLimitConfig,
};
pub use error::{AttemptFailure, Error, FetchAttempt, Result};
pub use extract::{
    ExtractionResult, ExtractionStats, Extractor, ManifestCheck, ResolvedUrl, Stage, resolve_url,
};
pub use fetcher::Fetcher;
pub use parser::{Section, SectionParser};
pub use rate_limit::{ClientSnapshot, RateDecision, RateLimiter, RateLimiterStats};
pub use service::{EXTRACTION_NAMESPACE, Service, VALIDATION_NAMESPACE};
pub use synth::{
    AGENT_GUIDE_FILENAME, Document, DocumentSynthesizer, FULL_DOCUMENT_FILENAME, Synthesis,
    estimate_tokens,
};
