//! Service-wide counters and the monitoring snapshot.
//!
//! One `MetricsAggregator` instance is created at startup and handed to
//! the service by `Arc`; there is no ambient global. Counters are
//! monotonic for the lifetime of the process.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free counters recorded by the scoring paths.
pub struct MetricsAggregator {
    predictions_total: AtomicU64,
    fraud_detected_total: AtomicU64,
    errors_total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    stream_messages_processed: AtomicU64,
    latency_sum_us: AtomicU64,
    latency_count: AtomicU64,
    start_time: Instant,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            predictions_total: AtomicU64::new(0),
            fraud_detected_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            stream_messages_processed: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed prediction and its end-to-end latency.
    pub fn record_prediction(&self, is_fraud: bool, latency: Duration) {
        self.predictions_total.fetch_add(1, Ordering::Relaxed);
        if is_fraud {
            self.fraud_detected_total.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_sum_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one message handled by the stream worker.
    pub fn record_stream_message(&self) {
        self.stream_messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters with derived rates.
    ///
    /// Individual counters are read consistently; exact cross-counter
    /// agreement at the same instant is not guaranteed and not needed.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let predictions = self.predictions_total.load(Ordering::Relaxed);
        let fraud = self.fraud_detected_total.load(Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.load(Ordering::Relaxed);
        let latency_count = self.latency_count.load(Ordering::Relaxed);

        let fraud_rate = if predictions > 0 {
            fraud as f64 / predictions as f64
        } else {
            0.0
        };
        let avg_prediction_latency_ms = if latency_count > 0 {
            latency_sum as f64 / latency_count as f64 / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            predictions_total: predictions,
            fraud_detected_total: fraud,
            fraud_rate,
            avg_prediction_latency_ms,
            errors_total: self.errors_total.load(Ordering::Relaxed),
            stream_messages_processed: self.stream_messages_processed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot served verbatim on the metrics endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub predictions_total: u64,
    pub fraud_detected_total: u64,
    pub fraud_rate: f64,
    pub avg_prediction_latency_ms: f64,
    pub errors_total: u64,
    pub stream_messages_processed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub uptime_seconds: f64,
}
