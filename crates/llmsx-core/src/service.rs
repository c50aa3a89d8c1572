//! The lifecycle-owning service context.
//!
//! [`Service`] owns the clock, both cache namespaces, the rate limiter and
//! the extraction pipeline, and implements the request flow:
//!
//! 1. admission (rate limiter, by client key)
//! 2. URL resolution
//! 3. cache lookup by origin
//! 4. on a miss, the full pipeline, then a cache write
//!
//! The cache write happens only after synthesis completes, so a request
//! future dropped mid-flight never leaves a partial entry behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

use crate::admin::{AdminSurface, CacheNamespace};
use crate::cache::TtlCache;
use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::extract::{ExtractionResult, Extractor, ManifestCheck, resolve_url};
use crate::fetcher::Fetcher;
use crate::rate_limit::RateLimiter;
use crate::Result;

/// Name of the namespace holding extraction results.
pub const EXTRACTION_NAMESPACE: &str = "extraction";

/// Name of the namespace holding manifest checks.
pub const VALIDATION_NAMESPACE: &str = "validation";

/// Cached, rate-limited extraction service.
pub struct Service {
    config: Config,
    extractor: Extractor,
    extractions: Arc<TtlCache<ExtractionResult>>,
    validations: Arc<TtlCache<ManifestCheck>>,
    limiter: Arc<RateLimiter>,
    admin: AdminSurface,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("config", &self.config)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Build a service on the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] for zero TTLs, sizes, limits or
    /// windows, and [`crate::Error::Network`] if the HTTP client cannot be
    /// built.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Build a service on an explicit clock.
    pub fn with_clock(config: Config, clock: SharedClock) -> Result<Self> {
        config.validate()?;

        let extractions = Arc::new(TtlCache::new(
            EXTRACTION_NAMESPACE,
            config.cache.extraction.ttl(),
            config.cache.extraction.max_size,
            Arc::clone(&clock),
        )?);
        let validations = Arc::new(TtlCache::new(
            VALIDATION_NAMESPACE,
            config.cache.validation.ttl(),
            config.cache.validation.max_size,
            Arc::clone(&clock),
        )?);
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.limit,
            config.rate_limit.window(),
            Arc::clone(&clock),
        )?);

        let namespaces: Vec<Arc<dyn CacheNamespace>> = vec![
            Arc::clone(&extractions) as Arc<dyn CacheNamespace>,
            Arc::clone(&validations) as Arc<dyn CacheNamespace>,
        ];
        let admin = AdminSurface::new(namespaces, Arc::clone(&limiter), clock);

        let extractor = Extractor::new(Fetcher::with_timeout(config.fetch.timeout())?);

        Ok(Self {
            config,
            extractor,
            extractions,
            validations,
            limiter,
            admin,
        })
    }

    /// Effective configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Statistics and maintenance over caches and the limiter.
    pub const fn admin(&self) -> &AdminSurface {
        &self.admin
    }

    /// Extract documentation for `url` on behalf of `client_key`.
    ///
    /// Admission is checked before anything else, so invalid URLs still
    /// count against the client. Cached results are returned as clones with
    /// `stats.processing_time_ms` measuring the cache lookup.
    ///
    /// # Errors
    ///
    /// [`crate::Error::RateLimited`], [`crate::Error::InvalidUrl`],
    /// [`crate::Error::NoManifestFound`], [`crate::Error::EmptyContent`] or
    /// [`crate::Error::Parse`].
    #[instrument(skip(self), fields(client = %client_key))]
    pub async fn extract(&self, client_key: &str, url: &str) -> Result<ExtractionResult> {
        self.admit(client_key).await?;
        let resolved = resolve_url(url)?;

        let lookup_started = Instant::now();
        if let Some(mut cached) = self.extractions.get(&resolved.origin).await {
            cached.stats.processing_time_ms =
                u64::try_from(lookup_started.elapsed().as_millis()).unwrap_or(u64::MAX);
            debug!(origin = %resolved.origin, "extraction cache hit");
            return Ok(cached);
        }
        debug!(origin = %resolved.origin, "extraction cache miss");

        let result = self.extractor.extract_resolved(&resolved).await?;
        self.extractions
            .set(resolved.origin.clone(), result.clone())
            .await;
        Ok(result)
    }

    /// Check whether `url` publishes a manifest, on behalf of `client_key`.
    ///
    /// Definitive answers are cached in the validation namespace under
    /// `"{origin}|manifest"`. Inconclusive checks (a timeout, transport
    /// error or 5xx on some candidate) fail with
    /// [`crate::Error::NoManifestFound`] and are not cached.
    #[instrument(skip(self), fields(client = %client_key))]
    pub async fn check_manifest(&self, client_key: &str, url: &str) -> Result<ManifestCheck> {
        self.admit(client_key).await?;
        let resolved = resolve_url(url)?;
        let key = format!("{}|manifest", resolved.origin);

        if let Some(cached) = self.validations.get(&key).await {
            debug!(%key, "validation cache hit");
            return Ok(cached);
        }
        debug!(%key, "validation cache miss");

        let check = self.extractor.check_resolved(&resolved).await?;
        self.validations.set(key, check.clone()).await;
        Ok(check)
    }

    async fn admit(&self, client_key: &str) -> Result<()> {
        self.limiter.check(client_key).await.into_result(client_key)
    }

    /// Spawn a task that prunes caches and limiter records every `interval`.
    ///
    /// The task runs until the handle is aborted or the runtime shuts down.
    /// Must be called from within a tokio runtime.
    pub fn spawn_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let admin = self.admin.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing to prune yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let report = admin.prune_all().await;
                if report.total() > 0 {
                    debug!(
                        removed = report.total(),
                        limiter = report.rate_limiter,
                        "maintenance pruned expired state"
                    );
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::clock::ManualClock;

    fn service_with_limit(limit: u32) -> (Service, ManualClock) {
        let clock = ManualClock::new(0);
        let mut config = Config::default();
        config.rate_limit.limit = limit;
        config.rate_limit.window_ms = 1_000;
        let service = Service::with_clock(config, Arc::new(clock.clone())).unwrap();
        (service, clock)
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let mut config = Config::default();
        config.cache.extraction.max_size = 0;
        assert!(matches!(Service::new(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_admission_runs_before_url_validation() {
        let (service, _clock) = service_with_limit(2);

        for _ in 0..2 {
            let err = service.extract("client", "ftp://nope").await.unwrap_err();
            assert!(matches!(err, Error::InvalidUrl(_)));
        }

        match service.extract("client", "ftp://nope").await.unwrap_err() {
            Error::RateLimited {
                client,
                remaining,
                reset_after,
            } => {
                assert_eq!(client, "client");
                assert_eq!(remaining, 0);
                assert_eq!(reset_after, Duration::from_secs(1));
            },
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_window_reset_readmits_client() {
        let (service, clock) = service_with_limit(1);

        assert!(matches!(
            service.check_manifest("a", "").await,
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            service.check_manifest("a", "").await,
            Err(Error::RateLimited { .. })
        ));
        // Other clients are independent.
        assert!(matches!(
            service.check_manifest("b", "").await,
            Err(Error::InvalidUrl(_))
        ));

        clock.advance(Duration::from_millis(1_000));
        assert!(matches!(
            service.check_manifest("a", "").await,
            Err(Error::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_sees_both_namespaces() {
        let (service, _clock) = service_with_limit(5);
        let snapshot = service.admin().snapshot().await;

        assert_eq!(
            snapshot.cache.keys().map(String::as_str).collect::<Vec<_>>(),
            vec![EXTRACTION_NAMESPACE, VALIDATION_NAMESPACE]
        );
        assert_eq!(snapshot.rate_limiter.configured_limit, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_prunes_limiter_records() {
        let (service, clock) = service_with_limit(5);
        let _ = service.extract("client", "").await;
        assert_eq!(service.admin().snapshot().await.rate_limiter.total_clients, 1);

        clock.advance(Duration::from_secs(5));
        let handle = service.spawn_maintenance(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.abort();

        assert_eq!(service.admin().snapshot().await.rate_limiter.total_clients, 0);
    }
}
