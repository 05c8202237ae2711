//! Tiered Cache - Per-Context Facade
//!
//! Reads go to the local tier first and fall through to the remote tier.
//! Remote hits (and single-key misses) are recorded locally so the same
//! context never asks twice. Every remote round trip is reported to the
//! instrumentation sink under the `cache` category.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::config::CacheSettings;
use super::entry::{decode_value, encode_value, LocalEntry};
use super::local::LocalStore;
use super::metrics::{LatencyTracker, MetricsSnapshot};
use super::remote::RemoteStats;
use super::service::CacheService;
use crate::error::Result;

/// Cache handle for one request, job or worker.
///
/// Owns its local tier, so it takes `&mut self` and is never shared between
/// concurrent contexts. Create one with [`CacheService::cache`].
pub struct TieredCache {
    service: Arc<CacheService>,
    local: LocalStore,
    /// Runtime override of `cache_enabled`
    remote_enabled: Option<bool>,
    /// Runtime override of `local_cache_enabled`
    local_enabled: Option<bool>,
}

impl TieredCache {
    /// Create a cache with an empty local tier
    pub fn new(service: Arc<CacheService>) -> Self {
        Self {
            service,
            local: LocalStore::new(),
            remote_enabled: None,
            local_enabled: None,
        }
    }

    fn remote_active(&self, settings: &CacheSettings) -> bool {
        self.remote_enabled.unwrap_or(settings.cache_enabled)
    }

    fn local_active(&self, settings: &CacheSettings) -> bool {
        self.local_enabled.unwrap_or(settings.local_cache_enabled)
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Fetch one value.
    ///
    /// With `use_local`, a value or recorded miss in the local tier is returned
    /// without a remote call, and the remote result (including a miss) is
    /// recorded locally. Without it, the local tier is neither read nor written.
    pub async fn get<V: DeserializeOwned>(&mut self, key: &str, use_local: bool) -> Result<Option<V>> {
        let settings = self.service.settings()?;
        let use_local = use_local && self.local_active(&settings);
        let metrics = self.service.metrics();

        if use_local {
            match self.local.get(key) {
                Some(LocalEntry::Present(data)) => {
                    metrics.record_local_hit();
                    return Ok(decode_or_miss(key, data));
                }
                Some(LocalEntry::Absent) => {
                    metrics.record_local_negative_hit();
                    return Ok(None);
                }
                None => metrics.record_local_miss(),
            }
        }

        if !self.remote_active(&settings) {
            return Ok(None);
        }

        let remote = self.service.remote().await?;
        let tracker = LatencyTracker::start();
        let found = remote.get(&settings.remote_key(key)).await;
        let elapsed = tracker.elapsed();

        metrics.record_remote_get(found.is_some(), elapsed);
        let outcome = if found.is_some() { "OK" } else { "FAILED" };
        self.service.record(&format!("GET {outcome}:{key}"), elapsed);

        if use_local {
            self.local.put(key, LocalEntry::from(found.clone()));
        }

        Ok(found.and_then(|data| decode_or_miss(key, &data)))
    }

    /// Fetch several values in at most one remote round trip per server.
    ///
    /// Keys with no value are left out of the result. Duplicate keys are
    /// looked up once. Keys the local tier has recorded as missing are not
    /// asked for again; pass `use_local = false` to force a remote lookup.
    /// Batch misses are not recorded locally.
    pub async fn get_many<K, V>(&mut self, keys: &[K], use_local: bool) -> Result<HashMap<String, V>>
    where
        K: AsRef<str>,
        V: DeserializeOwned,
    {
        let settings = self.service.settings()?;
        let use_local = use_local && self.local_active(&settings);
        let metrics = self.service.metrics();

        let mut results = HashMap::new();
        let mut remainder: Vec<&str> = Vec::new();
        let mut seen = HashSet::new();

        for key in keys.iter().map(AsRef::as_ref) {
            if !seen.insert(key) {
                continue;
            }
            if use_local {
                match self.local.get(key) {
                    Some(LocalEntry::Present(data)) => {
                        metrics.record_local_hit();
                        if let Some(value) = decode_or_miss(key, data) {
                            results.insert(key.to_string(), value);
                        }
                        continue;
                    }
                    Some(LocalEntry::Absent) => {
                        metrics.record_local_negative_hit();
                        continue;
                    }
                    None => metrics.record_local_miss(),
                }
            }
            remainder.push(key);
        }

        if remainder.is_empty() || !self.remote_active(&settings) {
            return Ok(results);
        }

        let remote = self.service.remote().await?;
        let remote_keys: Vec<String> = remainder
            .iter()
            .map(|key| settings.remote_key(key).into_owned())
            .collect();

        let tracker = LatencyTracker::start();
        let mut fetched = remote.get_many(&remote_keys).await;
        let elapsed = tracker.elapsed();

        let (hits, misses): (Vec<&str>, Vec<&str>) = remainder
            .iter()
            .zip(&remote_keys)
            .map(|(key, remote_key)| (*key, fetched.contains_key(remote_key)))
            .fold((Vec::new(), Vec::new()), |(mut hits, mut misses), (key, hit)| {
                if hit {
                    hits.push(key);
                } else {
                    misses.push(key);
                }
                (hits, misses)
            });

        metrics.record_remote_batch(remainder.len(), hits.len(), elapsed);
        self.service.record(
            &format!("GET HIT:{} keys : {}", hits.len(), hits.join("\n")),
            elapsed,
        );
        self.service.record(
            &format!("GET MISS:{} keys : {}", misses.len(), misses.join("\n")),
            elapsed,
        );

        for (key, remote_key) in remainder.iter().zip(&remote_keys) {
            let Some(data) = fetched.remove(remote_key) else {
                continue;
            };
            if let Some(value) = decode_or_miss(key, &data) {
                results.insert(key.to_string(), value);
            }
            if use_local {
                self.local.put_value(*key, data);
            }
        }

        Ok(results)
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Store a value.
    ///
    /// `ttl = None` uses the configured default. With `local`, the value also
    /// goes into the local tier while that tier is enabled, whether or not the
    /// remote tier is enabled or reachable. Returns whether the remote tier stored it; a `false` is
    /// informational and never an error.
    pub async fn set<V: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
        local: bool,
    ) -> Result<bool> {
        let settings = self.service.settings()?;

        let data = match encode_value(value) {
            Ok(data) => data,
            Err(e) => {
                warn!("Not caching {}: {}", key, e);
                return Ok(false);
            }
        };

        if local && self.local_active(&settings) {
            self.local.put_value(key, data.clone());
        }

        if !self.remote_active(&settings) {
            debug!("Remote tier disabled, skipping set of {}", key);
            return Ok(false);
        }

        let remote = self.service.remote().await?;
        let ttl = ttl.unwrap_or_else(|| settings.default_ttl());

        let tracker = LatencyTracker::start();
        let stored = remote
            .set(&settings.remote_key(key), data, ttl, settings.compression)
            .await;
        let elapsed = tracker.elapsed();

        self.service.metrics().record_remote_set(stored, elapsed);
        let outcome = if stored { "OK" } else { "FAILED" };
        self.service.record(&format!("SET {outcome}:{key}"), elapsed);

        Ok(stored)
    }

    /// Remove a value.
    ///
    /// Returns whether the remote tier deleted it. With `local`, the local
    /// entry is dropped whatever the remote outcome.
    pub async fn delete(&mut self, key: &str, local: bool) -> Result<bool> {
        let settings = self.service.settings()?;

        let deleted = if self.remote_active(&settings) {
            let remote = self.service.remote().await?;

            let tracker = LatencyTracker::start();
            let deleted = remote.delete(&settings.remote_key(key)).await;
            let elapsed = tracker.elapsed();

            self.service.metrics().record_remote_delete(deleted, elapsed);
            let outcome = if deleted { "OK" } else { "FAILED" };
            self.service.record(&format!("DELETE {outcome}:{key}"), elapsed);
            deleted
        } else {
            false
        };

        if local {
            self.local.delete(key);
        }

        Ok(deleted)
    }

    // =========================================================================
    // Switches
    // =========================================================================

    /// Turn both tiers on
    pub fn enable(&mut self) {
        self.remote_enabled = Some(true);
        self.enable_local();
    }

    /// Turn both tiers off
    pub fn disable(&mut self) {
        self.remote_enabled = Some(false);
        self.disable_local();
    }

    /// Turn the local tier on
    pub fn enable_local(&mut self) {
        self.local_enabled = Some(true);
    }

    /// Turn the local tier off. Existing entries stay until [`flush_local`](Self::flush_local).
    pub fn disable_local(&mut self) {
        self.local_enabled = Some(false);
    }

    /// Turn the remote tier on
    pub fn enable_remote(&mut self) {
        self.remote_enabled = Some(true);
    }

    /// Turn the remote tier off
    pub fn disable_remote(&mut self) {
        self.remote_enabled = Some(false);
    }

    /// Whether the remote tier is in use
    pub fn is_remote_enabled(&self) -> Result<bool> {
        let settings = self.service.settings()?;
        Ok(self.remote_active(&settings))
    }

    /// Whether the local tier is in use
    pub fn is_local_enabled(&self) -> Result<bool> {
        let settings = self.service.settings()?;
        Ok(self.local_active(&settings))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Drop every local entry. The remote tier is untouched.
    pub fn flush_local(&mut self) {
        debug!("Flushing {} local cache entries", self.local.len());
        self.local.clear();
    }

    /// The local tier
    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Remote tier statistics, per server
    pub async fn stats(&self) -> Result<RemoteStats> {
        let remote = self.service.remote().await?;
        Ok(remote.stats().await)
    }

    /// Snapshot of the process-wide counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.service.metrics_snapshot()
    }
}

fn decode_or_miss<V: DeserializeOwned>(key: &str, data: &Bytes) -> Option<V> {
    match decode_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Treating undecodable value for {} as a miss: {}", key, e);
            None
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{QueryLog, StaticConfigProvider};
    use crate::cache::{InMemoryRemoteStore, ServerConfig};
    use crate::domain::ports::CACHE_CATEGORY;
    use crate::error::Error;
    use assert_matches::assert_matches;
    use serde::Deserialize;

    struct Harness {
        remote: Arc<InMemoryRemoteStore>,
        log: Arc<QueryLog>,
        service: Arc<CacheService>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_settings(CacheSettings::new(vec![ServerConfig::new("127.0.0.1", 11211)]))
        }

        fn with_settings(settings: CacheSettings) -> Self {
            let remote = Arc::new(InMemoryRemoteStore::new());
            let log = Arc::new(QueryLog::new());
            log.enable_all();
            let service = Arc::new(CacheService::with_remote_store(
                Arc::new(StaticConfigProvider::new(settings)),
                log.clone(),
                remote.clone(),
            ));
            Self { remote, log, service }
        }

        fn descriptions(&self) -> Vec<String> {
            self.log
                .last_queries(CACHE_CATEGORY, None)
                .unwrap()
                .into_iter()
                .map(|q| q.description)
                .collect()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    #[tokio::test]
    async fn test_local_set_then_get_makes_no_remote_call() {
        let h = Harness::new();
        let mut cache = h.service.cache();
        let profile = Profile {
            name: "alice".into(),
            visits: 3,
        };

        cache.set("profile:alice", &profile, None, true).await.unwrap();
        let calls = h.remote.total_calls();

        let got: Option<Profile> = cache.get("profile:alice", true).await.unwrap();
        assert_eq!(got, Some(profile));
        assert_eq!(h.remote.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_get_miss_is_cached_negatively() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        let first: Option<String> = cache.get("nope", true).await.unwrap();
        assert_eq!(first, None);
        assert_eq!(h.remote.get_calls(), 1);
        assert_eq!(cache.local().get("nope"), Some(&LocalEntry::Absent));

        let second: Option<String> = cache.get("nope", true).await.unwrap();
        assert_eq!(second, None);
        assert_eq!(h.remote.get_calls(), 1);

        assert_eq!(h.descriptions(), vec!["GET FAILED:nope".to_string()]);
    }

    #[tokio::test]
    async fn test_bypassing_local_refetches() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        let _: Option<u32> = cache.get("late", true).await.unwrap();
        h.remote.insert("late", encode_value(&7u32).unwrap());

        // Recorded miss still wins locally
        assert_eq!(cache.get::<u32>("late", true).await.unwrap(), None);
        // Bypass sees the new value and leaves the local tier alone
        assert_eq!(cache.get::<u32>("late", false).await.unwrap(), Some(7));
        assert_eq!(cache.local().get("late"), Some(&LocalEntry::Absent));
    }

    #[tokio::test]
    async fn test_falsy_values_are_hits() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("zero", &0u32, None, false).await.unwrap();
        cache.set("empty", "", None, false).await.unwrap();
        cache.set("no", &false, None, false).await.unwrap();

        assert_eq!(cache.get::<u32>("zero", true).await.unwrap(), Some(0));
        assert_eq!(cache.get::<String>("empty", true).await.unwrap(), Some(String::new()));
        assert_eq!(cache.get::<bool>("no", true).await.unwrap(), Some(false));

        // Second round is served locally
        let calls = h.remote.get_calls();
        assert_eq!(cache.get::<bool>("no", true).await.unwrap(), Some(false));
        assert_eq!(h.remote.get_calls(), calls);
    }

    #[tokio::test]
    async fn test_batch_of_26_uses_one_remote_call() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        let keys: Vec<String> = ('A'..='Z').map(|c| format!("letter_{c}")).collect();
        for (i, key) in keys.iter().enumerate() {
            assert!(cache.set(key, &i, None, false).await.unwrap());
        }

        let found: HashMap<String, usize> = cache.get_many(&keys, true).await.unwrap();

        assert_eq!(found.len(), 26);
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(found[key], i);
        }
        assert_eq!(h.remote.get_many_calls(), 1);
        assert_eq!(h.remote.get_calls(), 0);

        let descriptions = h.descriptions();
        assert!(descriptions.iter().any(|d| d.starts_with("GET HIT:26 keys : letter_A\n")));
        assert!(descriptions.contains(&"GET MISS:0 keys : ".to_string()));
    }

    #[tokio::test]
    async fn test_get_many_merges_local_and_remote() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("local", &1, None, true).await.unwrap();
        h.remote.insert("remote", encode_value(&2).unwrap());
        let _: Option<i32> = cache.get("gone", true).await.unwrap();

        let keys = ["local", "remote", "gone", "unknown", "remote"];
        let found: HashMap<String, i32> = cache.get_many(&keys, true).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found["local"], 1);
        assert_eq!(found["remote"], 2);
        assert_eq!(h.remote.get_many_calls(), 1);

        // Only the keys without local knowledge went remote
        let descriptions = h.descriptions();
        assert!(descriptions.contains(&"GET HIT:1 keys : remote".to_string()));
        assert!(descriptions.contains(&"GET MISS:1 keys : unknown".to_string()));

        // Remote hit populated the local tier, the batch miss did not
        assert!(cache.local().get("remote").is_some());
        assert!(cache.local().get("unknown").is_none());
    }

    #[tokio::test]
    async fn test_get_many_all_local_skips_remote() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("a", "x", None, true).await.unwrap();
        cache.set("b", "y", None, true).await.unwrap();

        let found: HashMap<String, String> = cache.get_many(&["a", "b"], true).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(h.remote.get_many_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("k", "v", None, true).await.unwrap();

        assert!(cache.delete("k", true).await.unwrap());
        assert!(!cache.delete("k", true).await.unwrap());
        assert!(cache.local().get("k").is_none());
        assert!(!h.remote.contains("k"));

        let descriptions = h.descriptions();
        assert!(descriptions.contains(&"DELETE OK:k".to_string()));
        assert!(descriptions.contains(&"DELETE FAILED:k".to_string()));
    }

    #[tokio::test]
    async fn test_delete_without_local_keeps_local_entry() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("k", "v", None, true).await.unwrap();
        cache.delete("k", false).await.unwrap();

        assert!(cache.local().get("k").is_some());
    }

    #[tokio::test]
    async fn test_remote_disabled_fails_open() {
        let h = Harness::new();
        let mut cache = h.service.cache();
        cache.disable_remote();

        assert_eq!(cache.get::<String>("k", true).await.unwrap(), None);
        assert!(!cache.set("k", "v", None, false).await.unwrap());
        assert!(!cache.delete("k", false).await.unwrap());
        assert_eq!(h.remote.total_calls(), 0);

        // Explicit local writes still work
        assert!(!cache.set("mine", "v", None, true).await.unwrap());
        assert_eq!(cache.get::<String>("mine", true).await.unwrap(), Some("v".into()));
        let found: HashMap<String, String> = cache.get_many(&["mine", "k"], true).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(h.remote.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_remote_fails_open() {
        let h = Harness::new();
        let mut cache = h.service.cache();
        h.remote.set_unavailable(true);

        assert_eq!(cache.get::<String>("k", true).await.unwrap(), None);
        assert!(!cache.set("k", "v", None, true).await.unwrap());
        assert!(!cache.delete("other", true).await.unwrap());
        assert_eq!(cache.get::<String>("k", true).await.unwrap(), Some("v".into()));

        let descriptions = h.descriptions();
        assert!(descriptions.contains(&"SET FAILED:k".to_string()));
    }

    #[tokio::test]
    async fn test_disable_enable_symmetry() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        assert!(cache.is_remote_enabled().unwrap());
        assert!(cache.is_local_enabled().unwrap());

        cache.disable();
        assert!(!cache.is_remote_enabled().unwrap());
        assert!(!cache.is_local_enabled().unwrap());
        assert!(!cache.set("k", "v", None, false).await.unwrap());

        cache.enable();
        assert!(cache.is_remote_enabled().unwrap());
        assert!(cache.is_local_enabled().unwrap());
        assert!(cache.set("k", "v", None, false).await.unwrap());
        assert_eq!(cache.get::<String>("k", true).await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn test_local_disabled_always_goes_remote() {
        let h = Harness::new();
        let mut cache = h.service.cache();
        cache.disable_local();

        let _: Option<String> = cache.get("k", true).await.unwrap();
        let _: Option<String> = cache.get("k", true).await.unwrap();

        assert_eq!(h.remote.get_calls(), 2);
        assert!(cache.local().is_empty());
    }

    #[tokio::test]
    async fn test_local_disabled_ignores_local_writes() {
        let h = Harness::new();
        let mut cache = h.service.cache();
        cache.disable_local();

        for i in 0..100 {
            assert!(cache.set(&format!("k{i}"), &i, None, true).await.unwrap());
        }
        assert!(cache.local().is_empty());
        assert_eq!(h.remote.set_calls(), 100);

        cache.enable_local();
        cache.set("k0", &0, None, true).await.unwrap();
        assert_eq!(cache.local().len(), 1);
    }

    #[tokio::test]
    async fn test_settings_switches_are_initial_state() {
        let mut settings = CacheSettings::new(vec![ServerConfig::new("127.0.0.1", 11211)]);
        settings.cache_enabled = false;
        let h = Harness::with_settings(settings);
        let mut cache = h.service.cache();

        assert!(!cache.set("k", "v", None, false).await.unwrap());
        assert_eq!(h.remote.total_calls(), 0);

        cache.enable_remote();
        assert!(cache.set("k", "v", None, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_key_prefix_is_remote_only() {
        let mut settings = CacheSettings::new(vec![ServerConfig::new("127.0.0.1", 11211)]);
        settings.key_prefix = "app1_".into();
        let h = Harness::with_settings(settings);
        let mut cache = h.service.cache();

        cache.set("k", "v", None, true).await.unwrap();
        assert!(h.remote.contains("app1_k"));
        assert!(!h.remote.contains("k"));
        assert!(cache.local().get("k").is_some());

        let found: HashMap<String, String> = cache.get_many(&["k"], false).await.unwrap();
        assert_eq!(found.get("k").map(String::as_str), Some("v"));
        assert!(h.descriptions().contains(&"SET OK:k".to_string()));
    }

    #[tokio::test]
    async fn test_ttl_defaults_and_overrides() {
        let mut settings = CacheSettings::new(vec![ServerConfig::new("127.0.0.1", 11211)]);
        settings.default_ttl = 3600;
        let h = Harness::with_settings(settings);
        let mut cache = h.service.cache();

        cache
            .set("short", "v", Some(Duration::from_millis(20)), false)
            .await
            .unwrap();
        cache.set("long", "v", None, false).await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!h.remote.contains("short"));
        assert!(h.remote.contains("long"));
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_miss() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("k", "text", None, false).await.unwrap();
        assert_eq!(cache.get::<u64>("k", false).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_flush_local_keeps_remote() {
        let h = Harness::new();
        let mut cache = h.service.cache();

        cache.set("k", "v", None, true).await.unwrap();
        cache.flush_local();

        assert!(cache.local().is_empty());
        assert_eq!(cache.get::<String>("k", true).await.unwrap(), Some("v".into()));
        assert_eq!(h.remote.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_contexts_do_not_share_local_tier() {
        let h = Harness::new();
        let mut first = h.service.cache();
        let mut second = h.service.cache();

        let _: Option<String> = first.get("k", true).await.unwrap();
        h.remote.insert("k", encode_value("v").unwrap());

        assert_eq!(first.get::<String>("k", true).await.unwrap(), None);
        assert_eq!(second.get::<String>("k", true).await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn test_metrics_are_shared() {
        let h = Harness::new();
        let mut first = h.service.cache();
        let mut second = h.service.cache();

        first.set("k", "v", None, true).await.unwrap();
        let _: Option<String> = first.get("k", true).await.unwrap();
        let _: Option<String> = second.get("k", true).await.unwrap();

        let snapshot = second.metrics();
        assert_eq!(snapshot.local_hits, 1);
        assert_eq!(snapshot.local_misses, 1);
        assert_eq!(snapshot.remote_hits, 1);
        assert_eq!(snapshot.remote_sets, 1);
    }

    #[tokio::test]
    async fn test_stats_pass_through() {
        let h = Harness::new();
        let cache = h.service.cache();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.reachable(), 1);
        assert!(stats.server(crate::cache::IN_MEMORY_ADDRESS).is_some());
    }

    #[tokio::test]
    async fn test_misconfiguration_is_the_only_error() {
        let h = Harness::with_settings(CacheSettings::new(vec![]));
        let mut cache = h.service.cache();

        assert_matches!(cache.get::<String>("k", true).await, Err(Error::Config(_)));
        assert_matches!(cache.set("k", "v", None, true).await, Err(Error::Config(_)));
        assert_matches!(cache.delete("k", true).await, Err(Error::Config(_)));
        assert_matches!(cache.stats().await, Err(Error::Config(_)));
    }
}
