//! Concurrency tests for the shared guard
//!
//! These run on a multi-threaded runtime so breaker counting and cache
//! eviction are exercised by tasks racing on separate worker threads.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;
use toolguard::CacheConfig;
use toolguard::prelude::*;
use toolguard_core::retry::CircuitState;

fn single_attempt_guard(threshold: u32) -> Guard {
    Guard::new(
        GuardConfig::default()
            .with_retry(RetryPolicy::builder().max_attempts(1).build().unwrap())
            .with_breaker(BreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_secs(60),
            }),
    )
    .without_sink()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_failures_are_all_counted() {
    let guard = Arc::new(single_attempt_guard(8));
    let barrier = Arc::new(Barrier::new(7));

    let mut handles = Vec::new();
    for _ in 0..7 {
        let guard = Arc::clone(&guard);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            guard
                .execute("vector_search", || {
                    let barrier = Arc::clone(&barrier);
                    async move {
                        // Every call holds its permit until all seven are in flight.
                        barrier.wait().await;
                        Err::<(), _>(Failure::with_status(503, "unavailable"))
                    }
                })
                .await
        }));
    }
    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(!err.is_circuit_open());
        assert_eq!(err.attempts(), 1);
    }

    let breaker = guard.orchestrator().breaker();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 7);

    let err = guard
        .execute("vector_search", || async {
            Err::<(), _>(Failure::with_status(503, "unavailable"))
        })
        .await
        .unwrap_err();
    assert!(!err.is_circuit_open());
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.failure_count(), 8);
    assert_eq!(guard.orchestrator().stats().total_attempts, 8);

    let refused = guard
        .execute("vector_search", || async { Ok::<_, Failure>(()) })
        .await
        .unwrap_err();
    assert!(refused.is_circuit_open());
    assert_eq!(refused.attempts(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_inserts_respect_capacity() {
    let cache = Arc::new(ResponseCache::new(CacheConfig {
        max_size: 50,
        default_ttl: Duration::from_secs(3600),
    }));

    let mut handles = Vec::new();
    for task in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            let params = CacheParams::new().with("task", task);
            for i in 0..100 {
                assert!(cache.set("vector", &format!("q{i}"), json!(i), None, &params));
                assert!(cache.len() <= 50);
                tokio::task::yield_now().await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = cache.stats();
    assert!(stats.size <= 50, "size {}", stats.size);
    assert_eq!(stats.evictions + stats.size as u64, 800);
}
