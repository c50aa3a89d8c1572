//! Per-client fixed-window rate limiting.
//!
//! Each client key gets a counter and a window start. The first request
//! after the window has elapsed starts a fresh window. Rejected requests
//! still count, so hammering the limiter cannot slide the window forward.
//!
//! Fixed windows allow a burst of up to `2 × limit` straddling a window
//! boundary (the tail of one window plus the head of the next). That is an
//! accepted trade-off for O(1) state per client.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::{Millis, SharedClock, duration_millis};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct RateLimitRecord {
    window_start: Millis,
    count: u32,
}

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Configured requests per window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window ends, on the limiter's clock.
    pub reset_at: Millis,
    /// Time from now until `reset_at`.
    #[serde(rename = "retryAfterMs", serialize_with = "serialize_millis")]
    pub retry_after: Duration,
}

impl RateDecision {
    /// Convert a denial into [`Error::RateLimited`]; `Ok(())` when allowed.
    pub fn into_result(self, client: &str) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(Error::RateLimited {
                client: client.to_string(),
                remaining: self.remaining,
                reset_after: self.retry_after,
            })
        }
    }
}

/// Aggregate limiter statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterStats {
    /// Clients with a record (current or stale, until cleanup).
    pub total_clients: usize,
    /// Configured requests per window.
    pub configured_limit: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Admitted requests since start.
    pub allowed_total: u64,
    /// Rejected requests since start.
    pub rejected_total: u64,
}

/// Per-client view of the limiter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSnapshot {
    /// Client key.
    pub client_key: String,
    /// Requests counted in the client's window.
    pub count: u32,
    /// Window start on the limiter clock.
    pub window_start: Millis,
    /// Window end on the limiter clock.
    pub reset_at: Millis,
}

/// Fixed-window rate limiter keyed by client identity.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clock: SharedClock,
    records: Mutex<HashMap<String, RateLimitRecord>>,
    allowed_total: AtomicU64,
    rejected_total: AtomicU64,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window` per client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `limit` is zero or `window` rounds to
    /// zero milliseconds.
    pub fn new(limit: u32, window: Duration, clock: SharedClock) -> Result<Self> {
        if limit == 0 {
            return Err(Error::Config(
                "rate limit must allow at least one request per window".into(),
            ));
        }
        if duration_millis(window) == 0 {
            return Err(Error::Config("rate window must be at least 1ms".into()));
        }

        Ok(Self {
            limit,
            window,
            clock,
            records: Mutex::new(HashMap::new()),
            allowed_total: AtomicU64::new(0),
            rejected_total: AtomicU64::new(0),
        })
    }

    /// Configured requests per window.
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window length.
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Count a request from `client_key` and decide whether to admit it.
    pub async fn check(&self, client_key: &str) -> RateDecision {
        let now = self.clock.now_millis();
        let window_ms = duration_millis(self.window);

        let mut records = self.records.lock().await;
        let record = records
            .entry(client_key.to_string())
            .or_insert(RateLimitRecord {
                window_start: now,
                count: 0,
            });

        if now >= record.window_start.saturating_add(window_ms) {
            record.window_start = now;
            record.count = 0;
        }

        record.count = record.count.saturating_add(1);
        let count = record.count;
        let reset_at = record.window_start.saturating_add(window_ms);
        drop(records);

        let allowed = count <= self.limit;
        if allowed {
            self.allowed_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_total.fetch_add(1, Ordering::Relaxed);
            warn!(client = client_key, count, limit = self.limit, "rate limit exceeded");
        }

        RateDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(count),
            reset_at,
            retry_after: Duration::from_millis(reset_at.saturating_sub(now)),
        }
    }

    /// Remove records whose window has fully elapsed.
    ///
    /// A removed client starts a fresh window on its next request, exactly
    /// as if the record had been reset by `check`.
    pub async fn cleanup(&self) -> usize {
        let now = self.clock.now_millis();
        let window_ms = duration_millis(self.window);

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| now < record.window_start.saturating_add(window_ms));
        let removed = before - records.len();
        drop(records);

        if removed > 0 {
            debug!(removed, "cleaned up stale rate limit records");
        }
        removed
    }

    /// Remove every record unconditionally.
    pub async fn clear(&self) {
        self.records.lock().await.clear();
        debug!("rate limiter cleared");
    }

    /// Aggregate statistics; does not mutate state.
    pub async fn stats(&self) -> RateLimiterStats {
        let total_clients = self.records.lock().await.len();
        RateLimiterStats {
            total_clients,
            configured_limit: self.limit,
            window_ms: duration_millis(self.window),
            allowed_total: self.allowed_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
        }
    }

    /// Per-client snapshots sorted by client key.
    pub async fn client_snapshots(&self) -> Vec<ClientSnapshot> {
        let window_ms = duration_millis(self.window);
        let records = self.records.lock().await;
        let mut snapshots: Vec<ClientSnapshot> = records
            .iter()
            .map(|(key, record)| ClientSnapshot {
                client_key: key.clone(),
                count: record.count,
                window_start: record.window_start,
                reset_at: record.window_start.saturating_add(window_ms),
            })
            .collect();
        drop(records);

        snapshots.sort_by(|a, b| a.client_key.cmp(&b.client_key));
        snapshots
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration_millis(*duration))
}
