//! Cache Metrics Collection
//!
//! Process-wide counters shared by every [`TieredCache`](super::TieredCache)
//! created from one service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Cache metrics collector
#[derive(Debug, Default)]
pub struct CacheMetrics {
    // Local tier
    local_hits: AtomicU64,
    local_negative_hits: AtomicU64,
    local_misses: AtomicU64,

    // Remote tier, single-key
    remote_hits: AtomicU64,
    remote_misses: AtomicU64,
    remote_sets: AtomicU64,
    remote_set_failures: AtomicU64,
    remote_deletes: AtomicU64,
    remote_delete_failures: AtomicU64,

    // Remote tier, batched
    batch_requests: AtomicU64,
    batch_keys_requested: AtomicU64,
    batch_keys_returned: AtomicU64,

    // Operation latencies (microseconds, exponential moving average)
    get_latency_us: AtomicU64,
    batch_latency_us: AtomicU64,
    set_latency_us: AtomicU64,
    delete_latency_us: AtomicU64,
}

impl CacheMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    // Local tier
    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_negative_hit(&self) {
        self.local_negative_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_miss(&self) {
        self.local_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn local_hits(&self) -> u64 {
        self.local_hits.load(Ordering::Relaxed)
    }

    pub fn local_negative_hits(&self) -> u64 {
        self.local_negative_hits.load(Ordering::Relaxed)
    }

    pub fn local_misses(&self) -> u64 {
        self.local_misses.load(Ordering::Relaxed)
    }

    // Remote tier
    pub fn record_remote_get(&self, hit: bool, duration: Duration) {
        if hit {
            self.remote_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.remote_misses.fetch_add(1, Ordering::Relaxed);
        }
        self.update_latency_ema(&self.get_latency_us, duration);
    }

    pub fn record_remote_batch(&self, requested: usize, returned: usize, duration: Duration) {
        self.batch_requests.fetch_add(1, Ordering::Relaxed);
        self.batch_keys_requested
            .fetch_add(requested as u64, Ordering::Relaxed);
        self.batch_keys_returned
            .fetch_add(returned as u64, Ordering::Relaxed);
        self.update_latency_ema(&self.batch_latency_us, duration);
    }

    pub fn record_remote_set(&self, success: bool, duration: Duration) {
        self.remote_sets.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.remote_set_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.update_latency_ema(&self.set_latency_us, duration);
    }

    pub fn record_remote_delete(&self, success: bool, duration: Duration) {
        self.remote_deletes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.remote_delete_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.update_latency_ema(&self.delete_latency_us, duration);
    }

    pub fn remote_hits(&self) -> u64 {
        self.remote_hits.load(Ordering::Relaxed)
    }

    pub fn remote_misses(&self) -> u64 {
        self.remote_misses.load(Ordering::Relaxed)
    }

    pub fn batch_requests(&self) -> u64 {
        self.batch_requests.load(Ordering::Relaxed)
    }

    fn update_latency_ema(&self, target: &AtomicU64, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1; // EMA smoothing factor

        loop {
            let current = target.load(Ordering::Relaxed);
            let updated = if current == 0 {
                new_us
            } else {
                ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
            };

            if target
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    fn latency(target: &AtomicU64) -> Duration {
        Duration::from_micros(target.load(Ordering::Relaxed))
    }

    /// Fraction of lookups answered without a remote round trip
    pub fn local_hit_ratio(&self) -> f64 {
        let hits = (self.local_hits() + self.local_negative_hits()) as f64;
        let total = hits + self.local_misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Fraction of remote keys (single and batched) that came back with a value
    pub fn remote_hit_ratio(&self) -> f64 {
        let hits = self.remote_hits() + self.batch_keys_returned.load(Ordering::Relaxed);
        let total =
            self.remote_hits() + self.remote_misses() + self.batch_keys_requested.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            local_hits: self.local_hits(),
            local_negative_hits: self.local_negative_hits(),
            local_misses: self.local_misses(),
            local_hit_ratio: self.local_hit_ratio(),

            remote_hits: self.remote_hits(),
            remote_misses: self.remote_misses(),
            remote_sets: self.remote_sets.load(Ordering::Relaxed),
            remote_set_failures: self.remote_set_failures.load(Ordering::Relaxed),
            remote_deletes: self.remote_deletes.load(Ordering::Relaxed),
            remote_delete_failures: self.remote_delete_failures.load(Ordering::Relaxed),
            remote_hit_ratio: self.remote_hit_ratio(),

            batch_requests: self.batch_requests(),
            batch_keys_requested: self.batch_keys_requested.load(Ordering::Relaxed),
            batch_keys_returned: self.batch_keys_returned.load(Ordering::Relaxed),

            get_latency: Self::latency(&self.get_latency_us),
            batch_latency: Self::latency(&self.batch_latency_us),
            set_latency: Self::latency(&self.set_latency_us),
            delete_latency: Self::latency(&self.delete_latency_us),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        for counter in [
            &self.local_hits,
            &self.local_negative_hits,
            &self.local_misses,
            &self.remote_hits,
            &self.remote_misses,
            &self.remote_sets,
            &self.remote_set_failures,
            &self.remote_deletes,
            &self.remote_delete_failures,
            &self.batch_requests,
            &self.batch_keys_requested,
            &self.batch_keys_returned,
            &self.get_latency_us,
            &self.batch_latency_us,
            &self.set_latency_us,
            &self.delete_latency_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Snapshot of all cache metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    // Local
    pub local_hits: u64,
    pub local_negative_hits: u64,
    pub local_misses: u64,
    pub local_hit_ratio: f64,

    // Remote
    pub remote_hits: u64,
    pub remote_misses: u64,
    pub remote_sets: u64,
    pub remote_set_failures: u64,
    pub remote_deletes: u64,
    pub remote_delete_failures: u64,
    pub remote_hit_ratio: f64,

    // Batched
    pub batch_requests: u64,
    pub batch_keys_requested: u64,
    pub batch_keys_returned: u64,

    // Latency
    pub get_latency: Duration,
    pub batch_latency: Duration,
    pub set_latency: Duration,
    pub delete_latency: Duration,
}

/// Latency tracker helper
pub struct LatencyTracker {
    start: Instant,
}

impl LatencyTracker {
    /// Start tracking latency
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

// =============================================================================
// Tests
// =============================================================================
