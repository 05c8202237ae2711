//! Cache Service - Process-Wide State
//!
//! One `CacheService` per process, shared as `Arc`. It loads the settings and
//! builds the remote store exactly once, on first use, and hands out a fresh
//! [`TieredCache`] to every request or worker.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::cluster::MemcacheCluster;
use super::config::CacheSettings;
use super::manager::TieredCache;
use super::metrics::{CacheMetrics, MetricsSnapshot};
use super::remote::RemoteStore;
use crate::domain::ports::{ConfigProvider, InstrumentationSink, CACHE_CATEGORY};
use crate::error::{Error, Result};

/// Builds the remote store from the loaded settings
pub type RemoteConnector = Box<dyn Fn(&CacheSettings) -> Arc<dyn RemoteStore> + Send + Sync>;

/// Process-wide cache state
pub struct CacheService {
    config: Arc<dyn ConfigProvider>,
    sink: Arc<dyn InstrumentationSink>,
    connector: RemoteConnector,
    settings: once_cell::sync::OnceCell<Arc<CacheSettings>>,
    remote: tokio::sync::OnceCell<Arc<dyn RemoteStore>>,
    metrics: Arc<CacheMetrics>,
}

impl CacheService {
    /// Create a service backed by a memcached cluster
    pub fn new(config: Arc<dyn ConfigProvider>, sink: Arc<dyn InstrumentationSink>) -> Self {
        Self::with_connector(
            config,
            sink,
            Box::new(|settings| Arc::new(MemcacheCluster::new(settings)) as Arc<dyn RemoteStore>),
        )
    }

    /// Create a service backed by an existing remote store
    pub fn with_remote_store(
        config: Arc<dyn ConfigProvider>,
        sink: Arc<dyn InstrumentationSink>,
        store: Arc<dyn RemoteStore>,
    ) -> Self {
        Self::with_connector(config, sink, Box::new(move |_| Arc::clone(&store)))
    }

    /// Create a service with a custom remote store factory.
    ///
    /// The connector runs at most once, after the settings have loaded.
    pub fn with_connector(
        config: Arc<dyn ConfigProvider>,
        sink: Arc<dyn InstrumentationSink>,
        connector: RemoteConnector,
    ) -> Self {
        Self {
            config,
            sink,
            connector,
            settings: once_cell::sync::OnceCell::new(),
            remote: tokio::sync::OnceCell::new(),
            metrics: Arc::new(CacheMetrics::new()),
        }
    }

    /// Cache settings, loaded and validated on first call.
    ///
    /// A failed load is not remembered, so the next call tries again.
    pub fn settings(&self) -> Result<Arc<CacheSettings>> {
        self.settings
            .get_or_try_init(|| -> Result<Arc<CacheSettings>> {
                let settings = self.config.cache_settings().map_err(|e| match e {
                    Error::Config(msg) => Error::Config(msg),
                    other => Error::Config(other.to_string()),
                })?;
                settings.validate()?;

                info!(
                    "Cache configured: {} servers, compression={}, default_ttl={}s, remote={}, local={}",
                    settings.servers.len(),
                    settings.compression,
                    settings.default_ttl,
                    settings.cache_enabled,
                    settings.local_cache_enabled
                );
                Ok(Arc::new(settings))
            })
            .map(Arc::clone)
    }

    /// Remote store, built on first call
    pub async fn remote(&self) -> Result<Arc<dyn RemoteStore>> {
        let settings = self.settings()?;
        let store = self
            .remote
            .get_or_init(|| async { (self.connector)(&settings) })
            .await;
        Ok(Arc::clone(store))
    }

    /// Load settings and build the remote store now instead of on first use.
    ///
    /// Lets an application refuse to start on a bad configuration.
    pub async fn init(&self) -> Result<()> {
        self.remote().await.map(|_| ())
    }

    /// Fresh per-context cache with an empty local tier
    pub fn cache(self: &Arc<Self>) -> TieredCache {
        TieredCache::new(Arc::clone(self))
    }

    /// Report one remote operation to the instrumentation sink
    pub fn record(&self, description: &str, duration: Duration) {
        self.sink.record(CACHE_CATEGORY, description, duration);
    }

    /// Shared counters
    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Snapshot of the shared counters
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("settings", &self.settings.get())
            .field("connected", &self.remote.initialized())
            .finish_non_exhaustive()
    }
}
