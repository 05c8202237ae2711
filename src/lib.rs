//! tiercache - Two-Tier Read-Through Cache
//!
//! A per-context in-memory tier in front of a shared memcached cluster.
//! Reads check the local tier first and fall through to the cluster; writes go
//! to the cluster and optionally to the local tier. The cache fails open: an
//! unreachable or misbehaving server looks like a miss, never like an error.
//!
//! # Architecture
//!
//! ```text
//! Application → TieredCache (local tier) → RemoteStore (memcached cluster)
//!                      │
//!                      └─▶ InstrumentationSink (query log, Prometheus, tracing)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tiercache::adapters::{FileConfigProvider, TracingSink};
//! use tiercache::cache::CacheService;
//!
//! let service = Arc::new(CacheService::new(
//!     Arc::new(FileConfigProvider::new("config.yaml")),
//!     Arc::new(TracingSink::new()),
//! ));
//!
//! // One TieredCache per request or worker
//! let mut cache = service.cache();
//! cache.set("greeting", "hello", None, true).await?;
//! let greeting: Option<String> = cache.get("greeting", true).await?;
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Config providers and instrumentation sinks
//! - [`cache`] - Local tier, remote tier and the tiered facade
//! - [`domain`] - Ports for external collaborators
//! - [`error`] - Error types

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;

// Re-export commonly used types
pub use cache::{CacheService, CacheSettings, RemoteStore, ServerConfig, TieredCache};
pub use domain::{ConfigProvider, InstrumentationSink};
pub use error::{Error, Result};
