//! Property-Based Tests for the Tiered Cache
//!
//! # Test Properties
//!
//! 1. **Batch Subset**: `get_many(K)` only returns keys from `K`
//! 2. **Batch Agreement**: every batched value equals what `get` returns
//! 3. **Local Write**: a local `set` is read back with no remote call
//! 4. **Key Validation**: legal keys are never rejected

#![cfg(test)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use proptest::prelude::*;

use super::entry::{encode_value, validate_key};
use super::{CacheService, CacheSettings, InMemoryRemoteStore, ServerConfig, MAX_KEY_LENGTH};
use crate::adapters::{NoopSink, StaticConfigProvider};

// =============================================================================
// Property Strategies
// =============================================================================

/// Short keys from a small alphabet, so stored and requested sets overlap.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}"
}

/// Key/value pairs to seed the remote tier with.
fn stored_strategy() -> impl Strategy<Value = BTreeMap<String, i64>> {
    prop::collection::btree_map(key_strategy(), any::<i64>(), 0..20)
}

/// Keys to request, possibly with duplicates.
fn requested_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key_strategy(), 0..30)
}

fn service(remote: Arc<InMemoryRemoteStore>) -> Arc<CacheService> {
    Arc::new(CacheService::with_remote_store(
        Arc::new(StaticConfigProvider::new(CacheSettings::new(vec![
            ServerConfig::new("127.0.0.1", 11211),
        ]))),
        Arc::new(NoopSink),
        remote,
    ))
}

// =============================================================================
// Batch Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Batched results are a subset of the request and agree with single gets.
    #[test]
    fn prop_get_many_agrees_with_get(
        stored in stored_strategy(),
        requested in requested_strategy(),
        use_local in any::<bool>(),
    ) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        for (key, value) in &stored {
            remote.insert(key.clone(), encode_value(value).unwrap());
        }
        let service = service(remote.clone());

        let (batched, single) = tokio_test::block_on(async {
            let mut cache = service.cache();
            let batched: HashMap<String, i64> = cache.get_many(&requested, use_local).await.unwrap();

            let mut fresh = service.cache();
            let mut single = HashMap::new();
            for key in &requested {
                if let Some(value) = fresh.get::<i64>(key, use_local).await.unwrap() {
                    single.insert(key.clone(), value);
                }
            }
            (batched, single)
        });

        for key in batched.keys() {
            prop_assert!(requested.contains(key));
        }
        prop_assert_eq!(&batched, &single);
        for (key, value) in &batched {
            prop_assert_eq!(stored.get(key), Some(value));
        }
    }

    /// One batch call regardless of how many keys are requested.
    #[test]
    fn prop_get_many_single_round_trip(requested in requested_strategy()) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let service = service(remote.clone());

        tokio_test::block_on(async {
            let mut cache = service.cache();
            let _: HashMap<String, i64> = cache.get_many(&requested, true).await.unwrap();
        });

        let expected = u64::from(!requested.is_empty());
        prop_assert_eq!(remote.get_many_calls(), expected);
        prop_assert_eq!(remote.get_calls(), 0);
    }

    /// A local write is read back without touching the remote tier.
    #[test]
    fn prop_local_set_then_get(key in key_strategy(), value in any::<i64>()) {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let service = service(remote.clone());

        let got = tokio_test::block_on(async {
            let mut cache = service.cache();
            cache.set(&key, &value, None, true).await.unwrap();
            let before = remote.total_calls();
            let got = cache.get::<i64>(&key, true).await.unwrap();
            (got, remote.total_calls() - before)
        });

        prop_assert_eq!(got, (Some(value), 0));
    }
}

// =============================================================================
// Key Properties
// =============================================================================

proptest! {
    /// Printable, space-free ASCII keys up to the length limit are legal.
    #[test]
    fn prop_printable_keys_are_valid(key in "[!-~]{1,250}") {
        prop_assert!(key.len() <= MAX_KEY_LENGTH);
        prop_assert!(validate_key(&key).is_ok());
    }

    /// Any key containing a space is rejected.
    #[test]
    fn prop_keys_with_spaces_are_invalid(left in "[a-z]{0,10}", right in "[a-z]{0,10}") {
        let key = format!("{left} {right}");
        prop_assert!(validate_key(&key).is_err());
    }
}
