//! Time-bounded key/value cache with statistics and pruning.
//!
//! [`TtlCache`] is one namespace of cached values (extraction results,
//! manifest existence checks, ...). Every entry in a namespace shares the
//! same TTL. Reads are lazy: an expired entry is reported as a miss and left
//! in place. [`TtlCache::prune`] sweeps expired entries in bulk so the
//! request path never pays for a full scan.
//!
//! Eviction policy: when a new key would push the cache past `max_size`,
//! the entry with the smallest `expires_at` is dropped. With a single TTL
//! per namespace that is also the oldest insertion, and expired entries are
//! always the first to go.
//!
//! ```rust
//! use llmsx_core::{ManualClock, TtlCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test_block_on(async {
//! let clock = ManualClock::new(0);
//! let cache = TtlCache::new("demo", Duration::from_secs(60), 100, Arc::new(clock.clone()))?;
//!
//! cache.set("https://hono.dev", 42_u32).await;
//! assert_eq!(cache.get("https://hono.dev").await, Some(42));
//!
//! clock.advance(Duration::from_secs(61));
//! assert_eq!(cache.get("https://hono.dev").await, None);
//! assert_eq!(cache.prune().await, 1);
//! # Ok::<(), llmsx_core::Error>(())
//! # })?;
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! # Ok::<(), llmsx_core::Error>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::{Millis, SharedClock, duration_millis};
use crate::{Error, Result};

/// A single cached value and its bookkeeping.
struct CacheEntry<V> {
    value: V,
    created_at: Millis,
    expires_at: Millis,
    hits: AtomicU64,
}

impl<V> CacheEntry<V> {
    const fn is_live(&self, now: Millis) -> bool {
        now < self.expires_at
    }
}

/// Read-only view of an entry's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    /// Insertion time on the cache clock.
    pub created_at: Millis,
    /// Expiry time on the cache clock (`created_at + ttl`).
    pub expires_at: Millis,
    /// Successful reads since insertion.
    pub hits: u64,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time statistics for one cache namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Namespace name.
    pub name: String,
    /// Stored entries, live or not yet pruned.
    pub size: usize,
    /// Entry lifetime in milliseconds.
    pub ttl_ms: u64,
    /// Soft entry cap.
    pub max_size: usize,
    /// Reads that returned a live value.
    pub hits: u64,
    /// Reads that found nothing or an expired entry.
    pub misses: u64,
    /// Calls to `set`.
    pub inserts: u64,
    /// Entries dropped to stay under `max_size`.
    pub evictions: u64,
    /// Entries removed by `prune`.
    pub expired: u64,
    /// `hits / (hits + misses)`, 0 when there were no reads.
    pub hit_rate: f64,
}

/// Generic TTL cache keyed by string.
///
/// All mutation goes through a single `RwLock`; reads take the read lock
/// and bump atomic hit counters, so concurrent `get`s do not serialize.
pub struct TtlCache<V> {
    name: String,
    ttl: Duration,
    max_size: usize,
    clock: SharedClock,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    counters: CacheCounters,
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync,
{
    /// Create an empty namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `ttl` rounds to zero milliseconds or
    /// `max_size` is zero.
    pub fn new(
        name: impl Into<String>,
        ttl: Duration,
        max_size: usize,
        clock: SharedClock,
    ) -> Result<Self> {
        let name = name.into();
        if duration_millis(ttl) == 0 {
            return Err(Error::Config(format!(
                "cache '{name}': ttl must be at least 1ms"
            )));
        }
        if max_size == 0 {
            return Err(Error::Config(format!(
                "cache '{name}': max_size must be greater than zero"
            )));
        }

        Ok(Self {
            name,
            ttl,
            max_size,
            clock,
            entries: RwLock::new(HashMap::with_capacity(max_size.min(1024))),
            counters: CacheCounters::default(),
        })
    }

    /// Namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured entry lifetime.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return a clone of the value if the entry exists and is live.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                entry.hits.fetch_add(1, Ordering::Relaxed);
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key, "cache hit");
                Some(entry.value.clone())
            },
            Some(_) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key, "cache miss (expired)");
                None
            },
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key, "cache miss");
                None
            },
        }
    }

    /// Insert or overwrite an entry with a fresh lifetime and zero hits.
    pub async fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = self.clock.now_millis();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now.saturating_add(duration_millis(self.ttl)),
            hits: AtomicU64::new(0),
        };

        let mut entries = self.entries.write().await;
        if !entries.contains_key(&key) {
            while entries.len() >= self.max_size {
                let Some(victim) = soonest_to_expire(&entries) else {
                    break;
                };
                entries.remove(&victim);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key = %victim, "evicted entry to stay under max_size");
            }
        }
        entries.insert(key, entry);
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove an entry regardless of liveness, returning its value.
    pub async fn remove(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key).map(|entry| entry.value)
    }

    /// Metadata for an entry without counting as a read.
    pub async fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.entries.read().await.get(key).map(|entry| EntryInfo {
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            hits: entry.hits.load(Ordering::Relaxed),
        })
    }

    /// Remove every expired entry and return how many were removed.
    pub async fn prune(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();
        drop(entries);

        if removed > 0 {
            self.counters
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(cache = %self.name, removed, "pruned expired entries");
        }
        removed
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!(cache = %self.name, "cache cleared");
    }

    /// Stored entry count (live or not yet pruned).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of size, configuration, and counters.
    pub async fn stats(&self) -> CacheStats {
        let size = self.len().await;
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let reads = hits + misses;

        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if reads > 0 {
            hits as f64 / reads as f64
        } else {
            0.0
        };

        CacheStats {
            name: self.name.clone(),
            size,
            ttl_ms: duration_millis(self.ttl),
            max_size: self.max_size,
            hits,
            misses,
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

fn soonest_to_expire<V>(entries: &HashMap<String, CacheEntry<V>>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone())
}
