//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain HashMap model. Cache
//! construction spawns the sweep task, so each case runs inside
//! `tokio_test::block_on`.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{TtlCache, SWEEP_INTERVAL};
use crate::clock::ManualClock;

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}".prop_map(|s| s)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Peek { key: String },
    Invalidate { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Peek { key }),
        key_strategy().prop_map(|key| CacheOp::Invalidate { key }),
    ]
}

fn manual_cache() -> (Arc<ManualClock>, TtlCache<String, String>) {
    let clock = Arc::new(ManualClock::new());
    let cache = TtlCache::with_settings("prop", clock.clone(), SWEEP_INTERVAL);
    (clock, cache)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any sequence of operations behaves like a HashMap while nothing expires,
    // and only `get` moves the hit/miss counters.
    #[test]
    fn prop_matches_hashmap_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        tokio_test::block_on(async {
            let (_, cache) = manual_cache();
            let mut model: HashMap<String, String> = HashMap::new();
            let mut expected_hits: u64 = 0;
            let mut expected_misses: u64 = 0;

            for op in ops {
                match op {
                    CacheOp::Put { key, value } => {
                        cache.put(key.clone(), value.clone(), TEST_TTL).unwrap();
                        model.insert(key, value);
                    }
                    CacheOp::Get { key } => {
                        let got = cache.get(&key);
                        prop_assert_eq!(got.as_ref(), model.get(&key));
                        if got.is_some() {
                            expected_hits += 1;
                        } else {
                            expected_misses += 1;
                        }
                    }
                    CacheOp::Peek { key } => {
                        let peeked = cache.get_if_present(&key);
                        prop_assert_eq!(peeked.as_ref(), model.get(&key));
                    }
                    CacheOp::Invalidate { key } => {
                        cache.invalidate(&key);
                        model.remove(&key);
                    }
                }
            }

            let stats = cache.stats();
            prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
            prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
            prop_assert_eq!(stats.evictions, 0);
            prop_assert_eq!(cache.estimated_size(), model.len(), "Size mismatch");
            Ok(())
        })?;
    }

    // An entry is visible for strictly less than its TTL and gone from then on.
    #[test]
    fn prop_ttl_boundary(
        key in key_strategy(),
        value in value_strategy(),
        ttl_ms in 1u64..10_000,
        extra_ms in 0u64..10_000,
    ) {
        tokio_test::block_on(async {
            let (clock, cache) = manual_cache();
            cache.put(key.clone(), value.clone(), Duration::from_millis(ttl_ms)).unwrap();

            clock.advance(Duration::from_millis(ttl_ms - 1));
            prop_assert_eq!(cache.get(&key), Some(value));

            clock.advance(Duration::from_millis(1 + extra_ms));
            prop_assert_eq!(cache.get(&key), None);

            let stats = cache.stats();
            prop_assert_eq!(stats.hits, 1);
            prop_assert_eq!(stats.misses, 1);
            prop_assert_eq!(stats.evictions, 1);
            Ok(())
        })?;
    }

    // A sweep removes exactly the expired entries and leaves the rest readable.
    #[test]
    fn prop_purge_removes_only_expired(
        ttls in prop::collection::vec(1u64..100, 1..40),
        elapsed in 0u64..120,
    ) {
        tokio_test::block_on(async {
            let (clock, cache) = manual_cache();
            for (i, ttl) in ttls.iter().enumerate() {
                cache.put(format!("k{}", i), "v".to_string(), Duration::from_secs(*ttl)).unwrap();
            }

            clock.advance(Duration::from_secs(elapsed));
            let expected_removed = ttls.iter().filter(|ttl| **ttl <= elapsed).count();

            prop_assert_eq!(cache.purge_expired(), expected_removed);
            prop_assert_eq!(cache.estimated_size(), ttls.len() - expected_removed);
            for (i, ttl) in ttls.iter().enumerate() {
                prop_assert_eq!(cache.get_if_present(&format!("k{}", i)).is_some(), *ttl > elapsed);
            }
            Ok(())
        })?;
    }
}

// == Property Test for Error Response Format ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Every error variant renders as JSON with a string "error" field.
    #[test]
    fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}", n in 0u32..100) {
        use crate::error::GuardError;
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            GuardError::InvalidRequest(error_msg.clone()),
            GuardError::Internal(error_msg.clone()),
            GuardError::InvalidTtl(Duration::ZERO),
            GuardError::AccountLocked { remaining_minutes: i64::from(n) },
            GuardError::InvalidCredentials { remaining_attempts: n },
            GuardError::CaptchaRejected,
            GuardError::Forbidden,
        ];

        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = tokio_test::block_on(to_bytes(response.into_body(), usize::MAX)).unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(expected_msg.as_str()));
        }
    }
}
