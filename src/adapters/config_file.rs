//! Configuration Providers
//!
//! Implements the `ConfigProvider` port from a YAML file or a fixed value.
//!
//! The file holds the settings under a `cache:` key, so the cache section can
//! live in a larger application config:
//!
//! ```yaml
//! cache:
//!   servers:
//!     - host: 10.0.0.1
//!       port: 11211
//!       weight: 2
//!     - host: 10.0.0.2
//!   compression: true
//!   default_ttl: 3600
//!   connect_timeout_ms: 100
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::cache::{CacheSettings, ServerConfig};
use crate::domain::ports::ConfigProvider;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct ConfigFile {
    cache: CacheSettings,
}

/// Parse the `cache:` section of a YAML document.
pub fn parse_config(text: &str) -> Result<CacheSettings> {
    let file: ConfigFile = serde_yaml::from_str(text)?;
    Ok(file.cache)
}

/// Reads settings from a YAML file.
///
/// The file is read when the cache first needs its settings, not when the
/// provider is created.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
    servers: Option<Vec<ServerConfig>>,
}

impl FileConfigProvider {
    /// Create a provider for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            servers: None,
        }
    }

    /// Use these servers instead of the file's server list.
    pub fn with_servers(mut self, servers: Vec<ServerConfig>) -> Self {
        self.servers = Some(servers);
        self
    }

    /// Path of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfigProvider {
    fn cache_settings(&self) -> Result<CacheSettings> {
        debug!("Loading cache settings from {}", self.path.display());

        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", self.path.display(), e)))?;
        let mut settings = parse_config(&text)
            .map_err(|e| Error::Config(format!("{}: {}", self.path.display(), e)))?;

        if let Some(servers) = &self.servers {
            settings.servers = servers.clone();
        }
        Ok(settings)
    }
}

/// Hands out fixed settings.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    settings: CacheSettings,
}

impl StaticConfigProvider {
    pub fn new(settings: CacheSettings) -> Self {
        Self { settings }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn cache_settings(&self) -> Result<CacheSettings> {
        Ok(self.settings.clone())
    }
}
