//! Two-Tier Cache
//!
//! A per-context local tier in front of a shared memcached cluster.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                     CacheService (one per process)                       │
//! │   settings (OnceCell) │ remote store (OnceCell) │ metrics │ sink         │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │   TieredCache (one per request/worker)                                   │
//! │   ┌────────────────────┐          ┌──────────────────────────────────┐   │
//! │   │ LocalStore         │  miss ─▶ │ RemoteStore                      │   │
//! │   │ Present | Absent   │ ◀─ fill  │ MemcacheCluster (ASCII protocol) │   │
//! │   │ HashMap, no locks  │          │ weighted buckets, 1 conn/server  │   │
//! │   └────────────────────┘          └──────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Model
//!
//! The remote tier fails open. Unreachable servers, timeouts and protocol
//! errors look like misses or failed writes to the caller. The only error a
//! cache operation can return is [`Error::Config`](crate::error::Error::Config).

mod cluster;
mod config;
mod entry;
mod local;
mod manager;
mod metrics;
mod remote;
mod service;
pub mod compression;
pub mod protocol;

#[cfg(test)]
mod proptest;

pub use cluster::MemcacheCluster;
pub use compression::{PayloadCompressor, FLAG_COMPRESSED};
pub use config::{CacheSettings, ServerConfig};
pub use entry::{decode_value, encode_value, validate_key, LocalEntry};
pub use local::LocalStore;
pub use manager::TieredCache;
pub use metrics::{CacheMetrics, LatencyTracker, MetricsSnapshot};
pub use remote::{InMemoryRemoteStore, RemoteStats, RemoteStore, IN_MEMORY_ADDRESS};
pub use service::{CacheService, RemoteConnector};

/// Default memcached port
pub const DEFAULT_MEMCACHED_PORT: u16 = 11211;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 100;

/// Default per-request response timeout
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 500;

/// Values smaller than this are never compressed
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Largest server weight; each unit of weight is one routing bucket
pub const MAX_SERVER_WEIGHT: u32 = 1000;

/// Longest key memcached accepts
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest value accepted in a `get` reply (128MB)
pub const MAX_VALUE_SIZE: usize = 128 * 1024 * 1024;
