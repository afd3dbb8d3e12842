//! TTL-bounded result cache keyed by transaction fingerprint.
//!
//! The cache is an optimization, never a dependency: a missing or
//! failing store degrades every operation to a miss / no-op and the
//! serving path computes a fresh score. Hit and miss accounting lives
//! here so the HTTP path and the stream worker share one set of books.

use crate::metrics::MetricsAggregator;
use crate::types::ScoreResult;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A cached score with its expiry deadline.
#[derive(Debug, Clone)]
pub struct CachedScore {
    pub result: ScoreResult,
    pub expires_at: Instant,
}

impl CachedScore {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Key-value backend contract, mirroring an external cache client's
/// get/set surface. Implementations must be safe for concurrent use.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<CachedScore>>;
    fn set(&self, key: &str, entry: CachedScore) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// In-process store on a concurrent map. Entries are removed lazily
/// when a lookup finds them expired; no sweeper task is needed since
/// entries are small and TTL-bounded.
pub struct MemoryStore {
    entries: DashMap<String, CachedScore>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<CachedScore>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn set(&self, key: &str, entry: CachedScore) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Fingerprint-keyed cache of scoring results.
pub struct ResultCache {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
    metrics: Arc<MetricsAggregator>,
}

impl ResultCache {
    pub fn new(
        store: Option<Arc<dyn CacheStore>>,
        ttl: Duration,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            store,
            ttl,
            metrics,
        }
    }

    /// Cache with no backend: every lookup is a counted miss.
    pub fn disabled(metrics: Arc<MetricsAggregator>) -> Self {
        Self::new(None, Duration::ZERO, metrics)
    }

    /// Look up a previously computed result.
    ///
    /// Returns `None` when never written, expired, disabled, or when the
    /// store fails. Expired entries are deleted on the way out.
    pub fn get(&self, key: &str) -> Option<ScoreResult> {
        let Some(store) = &self.store else {
            self.metrics.record_cache_miss();
            return None;
        };

        match store.get(key) {
            Ok(Some(entry)) if entry.is_expired() => {
                if let Err(e) = store.remove(key) {
                    debug!(error = %e, "Failed to evict expired cache entry");
                }
                self.metrics.record_cache_miss();
                None
            }
            Ok(Some(entry)) => {
                self.metrics.record_cache_hit();
                Some(entry.result)
            }
            Ok(None) => {
                self.metrics.record_cache_miss();
                None
            }
            Err(e) => {
                debug!(error = %e, "Cache lookup failed, treating as miss");
                self.metrics.record_cache_miss();
                None
            }
        }
    }

    /// Write a freshly computed result through. Failures are swallowed.
    pub fn put(&self, key: &str, result: ScoreResult) {
        let Some(store) = &self.store else {
            return;
        };

        let entry = CachedScore {
            result,
            expires_at: Instant::now() + self.ttl,
        };
        if let Err(e) = store.set(key, entry) {
            debug!(error = %e, "Cache write failed, continuing without cache");
        }
    }
}
