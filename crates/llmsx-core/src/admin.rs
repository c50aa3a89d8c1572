//! Read-only statistics and privileged maintenance over the service state.
//!
//! [`AdminSurface`] aggregates every registered cache namespace and the
//! rate limiter. It never evaluates credentials: whoever holds a reference
//! is trusted, and the transport layer above decides who gets one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{CacheStats, TtlCache};
use crate::clock::{Millis, SharedClock};
use crate::rate_limit::{ClientSnapshot, RateLimiter, RateLimiterStats};

/// Object-safe handle on one cache namespace.
#[async_trait]
pub trait CacheNamespace: Send + Sync {
    /// Namespace name used as the key in reports.
    fn name(&self) -> &str;
    /// Current statistics.
    async fn stats(&self) -> CacheStats;
    /// Remove expired entries, returning how many were removed.
    async fn prune(&self) -> usize;
    /// Remove every entry.
    async fn clear(&self);
}

#[async_trait]
impl<V> CacheNamespace for TtlCache<V>
where
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        Self::name(self)
    }

    async fn stats(&self) -> CacheStats {
        Self::stats(self).await
    }

    async fn prune(&self) -> usize {
        Self::prune(self).await
    }

    async fn clear(&self) {
        Self::clear(self).await;
    }
}

/// Everything the stats endpoint reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    /// Statistics per cache namespace.
    pub cache: BTreeMap<String, CacheStats>,
    /// Rate limiter statistics.
    pub rate_limiter: RateLimiterStats,
    /// Per-client limiter state, sorted by client key.
    pub clients: Vec<ClientSnapshot>,
    /// Milliseconds since the service context was created.
    pub uptime_ms: Millis,
}

/// What `clear_all` should touch besides the caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearScope {
    /// Also drop every rate limit record.
    pub rate_limiter: bool,
}

/// Result of `clear_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    /// Entries held by each namespace right before it was cleared.
    pub cache: BTreeMap<String, usize>,
    /// Whether the rate limiter was cleared too.
    pub rate_limiter_cleared: bool,
}

/// Result of `prune_all`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    /// Expired entries removed per namespace.
    pub cache: BTreeMap<String, usize>,
    /// Stale rate limit records removed.
    pub rate_limiter: usize,
}

impl PruneReport {
    /// Total items removed across namespaces and the limiter.
    pub fn total(&self) -> usize {
        self.cache.values().sum::<usize>() + self.rate_limiter
    }
}

/// Aggregation and maintenance over caches and the rate limiter.
#[derive(Clone)]
pub struct AdminSurface {
    namespaces: Vec<Arc<dyn CacheNamespace>>,
    limiter: Arc<RateLimiter>,
    clock: SharedClock,
    started_at: Millis,
}

impl std::fmt::Debug for AdminSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.namespaces.iter().map(|ns| ns.name()).collect();
        f.debug_struct("AdminSurface")
            .field("namespaces", &names)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl AdminSurface {
    /// Build a surface over `namespaces` and `limiter`.
    pub fn new(
        namespaces: Vec<Arc<dyn CacheNamespace>>,
        limiter: Arc<RateLimiter>,
        clock: SharedClock,
    ) -> Self {
        let started_at = clock.now_millis();
        Self {
            namespaces,
            limiter,
            clock,
            started_at,
        }
    }

    /// Names of the registered namespaces, in registration order.
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .map(|ns| ns.name().to_string())
            .collect()
    }

    /// Aggregate statistics without mutating anything.
    pub async fn snapshot(&self) -> ServiceSnapshot {
        let mut cache = BTreeMap::new();
        for namespace in &self.namespaces {
            cache.insert(namespace.name().to_string(), namespace.stats().await);
        }

        ServiceSnapshot {
            cache,
            rate_limiter: self.limiter.stats().await,
            clients: self.limiter.client_snapshots().await,
            uptime_ms: self.clock.now_millis().saturating_sub(self.started_at),
        }
    }

    /// Clear every cache namespace, and the limiter only when asked.
    pub async fn clear_all(&self, scope: ClearScope) -> ClearReport {
        let mut cache = BTreeMap::new();
        for namespace in &self.namespaces {
            let held = namespace.stats().await.size;
            namespace.clear().await;
            cache.insert(namespace.name().to_string(), held);
        }

        if scope.rate_limiter {
            self.limiter.clear().await;
        }

        info!(
            namespaces = cache.len(),
            rate_limiter = scope.rate_limiter,
            "cleared service caches"
        );
        ClearReport {
            cache,
            rate_limiter_cleared: scope.rate_limiter,
        }
    }

    /// Prune every namespace and clean up stale limiter records.
    pub async fn prune_all(&self) -> PruneReport {
        let mut cache = BTreeMap::new();
        for namespace in &self.namespaces {
            cache.insert(namespace.name().to_string(), namespace.prune().await);
        }
        let rate_limiter = self.limiter.cleanup().await;

        let report = PruneReport {
            cache,
            rate_limiter,
        };
        debug!(removed = report.total(), "pruned service state");
        report
    }
}
