//! Cache Settings
//!
//! Server list and tunables, read once per process from a
//! [`ConfigProvider`](crate::domain::ports::ConfigProvider).

use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::entry::validate_key;
use super::{
    DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MEMCACHED_PORT,
    DEFAULT_RESPONSE_TIMEOUT_MS, MAX_SERVER_WEIGHT,
};
use crate::error::{Error, Result};

/// One memcached server in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address
    pub host: String,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Relative share of the key space
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl ServerConfig {
    /// Create a server entry with weight 1
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            weight: 1,
        }
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// `host:port` form used for connecting and in logs
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerConfig {
    type Err = Error;

    /// Parses `host`, `host:port` or `host:port:weight`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let host = parts.next().unwrap_or_default();
        if host.is_empty() {
            return Err(Error::Config(format!("missing host in server address {s:?}")));
        }

        let port = match parts.next() {
            Some(p) => p
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("bad port in server address {s:?}: {e}")))?,
            None => DEFAULT_MEMCACHED_PORT,
        };
        let weight = match parts.next() {
            Some(w) => w
                .parse::<u32>()
                .map_err(|e| Error::Config(format!("bad weight in server address {s:?}: {e}")))?,
            None => 1,
        };
        if parts.next().is_some() {
            return Err(Error::Config(format!(
                "server address {s:?} has too many fields"
            )));
        }

        Ok(ServerConfig::new(host, port).with_weight(weight))
    }
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Memcached servers
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    /// Compress large values before sending them to the remote tier
    #[serde(default = "default_true")]
    pub compression: bool,
    /// Values at least this many bytes are compressed
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    /// Default time-to-live in seconds (0 = no expiry)
    #[serde(default)]
    pub default_ttl: u64,
    /// TCP connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-request response timeout
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Remote tier enabled at start
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Local tier enabled at start
    #[serde(default = "default_true")]
    pub local_cache_enabled: bool,
    /// Namespace prepended to every remote key
    #[serde(default)]
    pub key_prefix: String,
}

impl CacheSettings {
    /// Settings with the given servers and defaults for everything else
    pub fn new(servers: Vec<ServerConfig>) -> Self {
        Self {
            servers,
            compression: true,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            default_ttl: 0,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            cache_enabled: true,
            local_cache_enabled: true,
            key_prefix: String::new(),
        }
    }

    /// Reject settings the cache can never work with
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::Config("no cache servers configured".into()));
        }

        for server in &self.servers {
            if server.host.trim().is_empty() {
                return Err(Error::Config("cache server with empty host".into()));
            }
            if server.port == 0 {
                return Err(Error::Config(format!(
                    "cache server {} has port 0",
                    server.host
                )));
            }
            if server.weight == 0 {
                return Err(Error::Config(format!(
                    "cache server {} has weight 0",
                    server.address()
                )));
            }
            if server.weight > MAX_SERVER_WEIGHT {
                return Err(Error::Config(format!(
                    "cache server {} has weight {}, limit is {}",
                    server.address(),
                    server.weight,
                    MAX_SERVER_WEIGHT
                )));
            }
        }

        if self.connect_timeout_ms == 0 {
            return Err(Error::Config("connect_timeout_ms must be positive".into()));
        }
        if self.response_timeout_ms == 0 {
            return Err(Error::Config("response_timeout_ms must be positive".into()));
        }

        if !self.key_prefix.is_empty() {
            validate_key(&self.key_prefix)
                .map_err(|e| Error::Config(format!("bad key_prefix: {e}")))?;
        }

        Ok(())
    }

    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Response timeout as a `Duration`
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Default TTL as a `Duration`
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Key as stored on the remote tier
    pub fn remote_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        if self.key_prefix.is_empty() {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(format!("{}{}", self.key_prefix, key))
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    DEFAULT_MEMCACHED_PORT
}

fn default_weight() -> u32 {
    1
}

fn default_compression_threshold() -> usize {
    DEFAULT_COMPRESSION_THRESHOLD
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_response_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}
