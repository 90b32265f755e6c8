//! Property-Based Tests for Cache Keys and Budgets
//!
//! # Test Properties
//!
//! 1. **Query Independence**: URLs differing only in query share a key
//! 2. **Idempotence**: normalizing a normalized URL changes nothing
//! 3. **Budget**: memory usage never exceeds capacity

#![cfg(test)]

use std::sync::Arc;

use proptest::prelude::*;

use super::{ByteCount, CacheKey, MemoryCache, MemoryCacheConfig};

// =============================================================================
// Property Strategies
// =============================================================================

fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}(\\.[a-z]{2,6}){1,2}"
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[A-Za-z0-9_-]{1,10}", 0..4).prop_map(|parts| parts.join("/"))
}

fn query_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}=[A-Za-z0-9]{0,16}(&[a-z]{1,6}=[A-Za-z0-9]{0,16}){0,3}"
}

// =============================================================================
// Normalization Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_query_does_not_affect_key(
        host in host_strategy(),
        path in path_strategy(),
        q1 in query_strategy(),
        q2 in query_strategy(),
    ) {
        let (_, a) = CacheKey::parse(&format!("https://{}/{}?{}", host, path, q1)).unwrap();
        let (_, b) = CacheKey::parse(&format!("https://{}/{}?{}", host, path, q2)).unwrap();
        let (_, bare) = CacheKey::parse(&format!("https://{}/{}", host, path)).unwrap();

        prop_assert_eq!(&a, &b);
        prop_assert_eq!(&a, &bare);
        prop_assert!(!a.as_str().contains('?'));
    }

    #[test]
    fn prop_normalization_is_idempotent(
        host in host_strategy(),
        path in path_strategy(),
        query in query_strategy(),
    ) {
        let (_, once) = CacheKey::parse(&format!("https://{}/{}?{}", host, path, query)).unwrap();
        let (_, twice) = CacheKey::parse(once.as_str()).unwrap();

        prop_assert_eq!(once.as_str(), twice.as_str());
        prop_assert_eq!(once.file_stem(), twice.file_stem());
    }

    #[test]
    fn prop_different_paths_differ(
        host in host_strategy(),
        a in "[a-z]{1,8}",
        b in "[a-z]{1,8}",
    ) {
        prop_assume!(a != b);
        let (_, ka) = CacheKey::parse(&format!("https://{}/{}", host, a)).unwrap();
        let (_, kb) = CacheKey::parse(&format!("https://{}/{}", host, b)).unwrap();
        prop_assert_ne!(ka, kb);
    }
}

// =============================================================================
// Budget Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_memory_usage_stays_within_capacity(
        costs in prop::collection::vec(1u64..400, 1..200),
    ) {
        let cache: MemoryCache<u64> = MemoryCache::with_config(MemoryCacheConfig {
            capacity: ByteCount::bytes(1_000),
            ..Default::default()
        });

        for (i, cost) in costs.iter().enumerate() {
            let key = CacheKey::from_normalized(&format!("https://img.example.com/{}", i));
            cache.store(key, Arc::new(i as u64), *cost);
            prop_assert!(cache.size() <= 1_000);
        }
    }
}
