//! Remote Tier - Shared Key-Value Store
//!
//! The [`RemoteStore`] trait is the seam between the facade and the network.
//! Implementations fail open: a broken connection or a bad reply looks like a
//! miss (`None`, empty map) or an unsuccessful write (`false`). Nothing here
//! returns an error.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;

/// Remote store trait
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch one key
    async fn get(&self, key: &str) -> Option<Bytes>;

    /// Fetch several keys in one round trip per server.
    ///
    /// Keys without a value are missing from the returned map.
    async fn get_many(&self, keys: &[String]) -> HashMap<String, Bytes>;

    /// Store a value. A zero TTL never expires.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration, compress: bool) -> bool;

    /// Remove a key. `false` if it was not there or the server could not be reached.
    async fn delete(&self, key: &str) -> bool;

    /// Diagnostic statistics, per server
    async fn stats(&self) -> RemoteStats;
}

/// Per-server diagnostic statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteStats {
    /// Server address -> `STAT` name -> value. Unreachable servers map to an
    /// empty set.
    pub servers: BTreeMap<String, BTreeMap<String, String>>,
}

impl RemoteStats {
    /// Stats for one server
    pub fn server(&self, address: &str) -> Option<&BTreeMap<String, String>> {
        self.servers.get(address)
    }

    /// Number of servers that answered
    pub fn reachable(&self) -> usize {
        self.servers.values().filter(|s| !s.is_empty()).count()
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Address reported by [`InMemoryRemoteStore::stats`]
pub const IN_MEMORY_ADDRESS: &str = "in-memory";

#[derive(Debug, Clone)]
struct StoredItem {
    data: Bytes,
    expires_at: Option<Instant>,
}

impl StoredItem {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process remote store.
///
/// Counts every call so tests can assert on round trips, and can be switched
/// into an outage mode where every call fails open.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    items: DashMap<String, StoredItem>,
    unavailable: AtomicBool,
    gets: AtomicU64,
    batch_gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryRemoteStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage (`true`) or recover from one (`false`)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::Relaxed)
    }

    /// Single-key `get` calls so far
    pub fn get_calls(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// `get_many` calls so far
    pub fn get_many_calls(&self) -> u64 {
        self.batch_gets.load(Ordering::Relaxed)
    }

    /// `set` calls so far
    pub fn set_calls(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    /// `delete` calls so far
    pub fn delete_calls(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Every call of any kind so far
    pub fn total_calls(&self) -> u64 {
        self.get_calls() + self.get_many_calls() + self.set_calls() + self.delete_calls()
    }

    /// Whether a live value is stored under `key`, without counting a call
    pub fn contains(&self, key: &str) -> bool {
        self.items.get(key).is_some_and(|item| !item.is_expired())
    }

    /// Store a value directly, without counting a call
    pub fn insert(&self, key: impl Into<String>, data: Bytes) {
        self.items.insert(
            key.into(),
            StoredItem {
                data,
                expires_at: None,
            },
        );
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let item = self.items.get(key)?;
        if item.is_expired() {
            drop(item);
            self.items.remove(key);
            return None;
        }
        Some(item.data.clone())
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get(&self, key: &str) -> Option<Bytes> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if self.is_unavailable() {
            return None;
        }
        self.lookup(key)
    }

    async fn get_many(&self, keys: &[String]) -> HashMap<String, Bytes> {
        self.batch_gets.fetch_add(1, Ordering::Relaxed);
        if self.is_unavailable() {
            return HashMap::new();
        }
        keys.iter()
            .filter_map(|key| self.lookup(key).map(|data| (key.clone(), data)))
            .collect()
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration, _compress: bool) -> bool {
        self.sets.fetch_add(1, Ordering::Relaxed);
        if self.is_unavailable() {
            return false;
        }
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        self.items.insert(
            key.to_string(),
            StoredItem {
                data: value,
                expires_at,
            },
        );
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        if self.is_unavailable() {
            return false;
        }
        self.items.remove(key).is_some()
    }

    async fn stats(&self) -> RemoteStats {
        let mut stats = RemoteStats::default();
        let mut server = BTreeMap::new();
        if !self.is_unavailable() {
            server.insert("curr_items".to_string(), self.items.len().to_string());
            server.insert(
                "cmd_get".to_string(),
                (self.get_calls() + self.get_many_calls()).to_string(),
            );
            server.insert("cmd_set".to_string(), self.set_calls().to_string());
        }
        stats.servers.insert(IN_MEMORY_ADDRESS.to_string(), server);
        stats
    }
}
