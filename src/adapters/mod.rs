//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │          ConfigProvider │ InstrumentationSink              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ FileConfigProvider │ StaticConfigProvider                  │ │
//! │  │ QueryLog │ PrometheusSink │ TracingSink │ CompositeSink    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tiercache::adapters::{FileConfigProvider, QueryLog};
//! use tiercache::cache::CacheService;
//!
//! let log = Arc::new(QueryLog::new());
//! log.enable("cache")?;
//!
//! let service = Arc::new(CacheService::new(
//!     Arc::new(FileConfigProvider::new("/etc/app/config.yaml")),
//!     log.clone(),
//! ));
//!
//! let mut cache = service.cache();
//! let user: Option<User> = cache.get("user:42", true).await?;
//! ```

mod config_file;
mod prometheus;
mod query_log;
mod sinks;

pub use config_file::{parse_config, FileConfigProvider, StaticConfigProvider};
pub use prometheus::PrometheusSink;
pub use query_log::{QueryLog, QueryRecord, DEFAULT_QUERY_LOG_CAPACITY, QUERY_CATEGORIES};
pub use sinks::{CompositeSink, NoopSink, TracingSink};
