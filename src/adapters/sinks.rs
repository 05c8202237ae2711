//! Instrumentation Sink Adapters
//!
//! Simple implementations of the `InstrumentationSink` port.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::ports::InstrumentationSink;

/// Emits every record as a tracing event.
#[derive(Debug, Clone, Default)]
pub struct TracingSink {
    /// Whether to log records at info level (true) or debug level (false)
    info_level: bool,
}

impl TracingSink {
    /// Create a sink that logs at debug level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that logs at info level.
    pub fn info_level() -> Self {
        Self { info_level: true }
    }
}

impl InstrumentationSink for TracingSink {
    fn record(&self, category: &str, description: &str, duration: Duration) {
        let duration_us = duration.as_micros() as u64;
        if self.info_level {
            info!(category, duration_us, "{}", description);
        } else {
            debug!(category, duration_us, "{}", description);
        }
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl InstrumentationSink for NoopSink {
    fn record(&self, _category: &str, _description: &str, _duration: Duration) {}
}

/// Forwards every record to several sinks.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn InstrumentationSink>>,
}

impl CompositeSink {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink to the composite.
    pub fn with_sink(mut self, sink: Arc<dyn InstrumentationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for CompositeSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl InstrumentationSink for CompositeSink {
    fn record(&self, category: &str, description: &str, duration: Duration) {
        for sink in &self.sinks {
            sink.record(category, description, duration);
        }
    }
}
