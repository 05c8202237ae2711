//! Prometheus Instrumentation Adapter
//!
//! Implements the `InstrumentationSink` port by observing each record into a
//! latency histogram labelled by category, operation and outcome. Keys
//! reported by batched lookups are counted separately.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::domain::ports::{parse_description, InstrumentationSink};
use crate::error::Result;

/// Histogram buckets in seconds, from 50µs to 1s
const LATENCY_BUCKETS: [f64; 12] = [
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.1, 0.5, 1.0,
];

/// Prometheus-backed instrumentation sink.
#[derive(Clone)]
pub struct PrometheusSink {
    registry: Registry,
    operations: HistogramVec,
    batch_keys: IntCounterVec,
}

impl PrometheusSink {
    /// Create a sink with its own registry.
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Create a sink registering its metrics in `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self> {
        let operations = HistogramVec::new(
            HistogramOpts::new(
                "tiercache_operation_duration_seconds",
                "Duration of remote cache operations",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["category", "operation", "outcome"],
        )?;
        registry.register(Box::new(operations.clone()))?;

        let batch_keys = IntCounterVec::new(
            Opts::new(
                "tiercache_batch_keys_total",
                "Keys returned (hit) or not returned (miss) by batched lookups",
            ),
            &["category", "outcome"],
        )?;
        registry.register(Box::new(batch_keys.clone()))?;

        Ok(Self {
            registry,
            operations,
            batch_keys,
        })
    }

    /// The registry holding this sink's metrics.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render every metric in the registry in the text exposition format.
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink").finish_non_exhaustive()
    }
}

/// Key count from a batch description such as `GET HIT:26 keys : ...`
fn batch_key_count(description: &str) -> Option<u64> {
    let (_, rest) = description.split_once(':')?;
    rest.split_whitespace().next()?.parse().ok()
}

impl InstrumentationSink for PrometheusSink {
    fn record(&self, category: &str, description: &str, duration: Duration) {
        let (operation, outcome) = parse_description(description);

        self.operations
            .with_label_values(&[category, operation.as_str(), outcome.as_str()])
            .observe(duration.as_secs_f64());

        if outcome == "hit" || outcome == "miss" {
            if let Some(count) = batch_key_count(description) {
                self.batch_keys
                    .with_label_values(&[category, outcome.as_str()])
                    .inc_by(count);
            }
        }
    }
}
