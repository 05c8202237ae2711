//! Domain Ports (Port/Adapter Pattern)
//!
//! The cache core depends on two external collaborators: something that
//! supplies its settings, and something that records how long each remote
//! operation took. Adapters in [`crate::adapters`] implement both.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Cache Core                          │
//! │        TieredCache  ──▶  CacheService  ──▶  RemoteStore   │
//! └──────────────────────────────────────────────────────────┘
//!            │                       │
//!            ▼                       ▼
//! ┌──────────────────────┐  ┌─────────────────────────────┐
//! │ InstrumentationSink  │  │ ConfigProvider               │
//! │ QueryLog │ Tracing   │  │ FileConfigProvider │ Static  │
//! │ Prometheus │ Noop    │  │                              │
//! └──────────────────────┘  └─────────────────────────────┘
//! ```

use std::time::Duration;

use crate::cache::CacheSettings;
use crate::error::Result;

/// Category tag attached to every record the cache core emits.
pub const CACHE_CATEGORY: &str = "cache";

// =============================================================================
// Configuration Port
// =============================================================================

/// Port for loading cache settings.
///
/// Called at most once per [`crate::cache::CacheService`]. An `Err` here is a
/// misconfiguration and is returned from the first cache operation.
pub trait ConfigProvider: Send + Sync {
    /// Load the server list and tunables.
    fn cache_settings(&self) -> Result<CacheSettings>;
}

// =============================================================================
// Instrumentation Port
// =============================================================================

/// Port for recording the outcome and duration of a cache operation.
///
/// Implementations must be cheap and must not block: the call happens inline on
/// every remote round trip.
///
/// # Example
///
/// ```ignore
/// struct StderrSink;
///
/// impl InstrumentationSink for StderrSink {
///     fn record(&self, category: &str, description: &str, duration: Duration) {
///         eprintln!("[{category}] {description} ({:.6}s)", duration.as_secs_f64());
///     }
/// }
/// ```
pub trait InstrumentationSink: Send + Sync {
    /// Record one operation.
    fn record(&self, category: &str, description: &str, duration: Duration);
}

/// Splits a description such as `GET OK:user:1` into `("get", "ok")`.
///
/// Descriptions without a recognizable `<OP> <OUTCOME>:` head come back as
/// `("unknown", "unknown")`.
pub fn parse_description(description: &str) -> (String, String) {
    let head = description.split(':').next().unwrap_or_default();
    let mut parts = head.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(op), Some(outcome)) => (op.to_lowercase(), outcome.to_lowercase()),
        _ => ("unknown".to_string(), "unknown".to_string()),
    }
}
