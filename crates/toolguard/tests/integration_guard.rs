//! Integration tests for the guard facade
//!
//! These drive simulated tool backends through `Guard::call` and check the
//! interplay of cache, retry policy, circuit breaker and health report.

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use toolguard::cache::ttl;
use toolguard::prelude::*;
use toolguard_core::retry::CircuitState;

#[derive(Default)]
struct EventLog(Mutex<Vec<RetryEvent>>);

#[async_trait]
impl EventSink for EventLog {
    async fn on_event(&self, event: RetryEvent) {
        self.0.lock().push(event);
    }
}

impl EventLog {
    fn types(&self) -> Vec<&'static str> {
        self.0.lock().iter().map(RetryEvent::event_type).collect()
    }
}

fn config(max_attempts: u32, threshold: u32) -> GuardConfig {
    GuardConfig::default()
        .with_retry(
            RetryPolicy::builder()
                .max_attempts(max_attempts)
                .base_delay(Duration::from_secs(1))
                .exponential_base(2.0)
                .jitter_factor(0.0)
                .build()
                .unwrap(),
        )
        .with_breaker(BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: Duration::from_secs(60),
        })
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_search_retries_then_caches() {
    let events = Arc::new(EventLog::default());
    let guard = Guard::new(config(3, 5)).with_sink(events.clone());
    let calls = AtomicU32::new(0);
    let params = CacheParams::new().with("max_results", 5);

    let start = Instant::now();
    let results: Vec<String> = guard
        .call("tavily", "rust async", &params, Some(ttl::WEB_SEARCH), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Failure::with_status(429, "slow down"))
                } else {
                    Ok(vec!["tokio.rs".to_string(), "async-book".to_string()])
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(results, vec!["tokio.rs", "async-book"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // First rate-limit backoff is base * 2^1.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(
        events.types(),
        vec!["retry_delay", "retry_attempt", "retry_success"]
    );

    // Same namespace, query and params is a cache hit.
    let again: Vec<String> = guard
        .call(
            "tavily",
            "rust async",
            &CacheParams::new().with("max_results", 5),
            None,
            || async { Err::<Vec<String>, _>(Failure::new("must not be called")) },
        )
        .await
        .unwrap();
    assert_eq!(again, results);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let health = guard.health();
    assert_eq!(health.status, HealthStatus::Excellent);
    assert_eq!(health.cache.hits, 1);
    assert_eq!(health.error_recovery.success_count, 1);
    assert_eq!(health.error_recovery.recent_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_surfaces_last_error() {
    let guard = Guard::new(config(3, 10)).without_sink();
    let calls = AtomicU32::new(0);

    let start = Instant::now();
    let err = guard
        .execute("tavily_search", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Failure::with_status(429, "slow down")) }
        })
        .await
        .unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.attempts(), 3);
    assert_eq!(err.kind(), Some(FailureKind::RateLimit));
    assert_eq!(err.last_error().and_then(Failure::status), Some(429));
    // Delays of 2s and 4s, no sleep after the final attempt.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_refuses_then_recovers() {
    let events = Arc::new(EventLog::default());
    let guard = Guard::new(config(5, 2)).with_sink(events.clone());
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let op = || {
        let healthy = Arc::clone(&healthy);
        async move {
            if healthy.load(Ordering::SeqCst) {
                Ok("page")
            } else {
                Err(Failure::with_status(503, "unavailable"))
            }
        }
    };

    let err = guard.execute("wikipedia_search", op).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.attempts(), 2);
    assert_eq!(guard.orchestrator().breaker().state(), CircuitState::Open);
    assert_eq!(guard.health().status, HealthStatus::Critical);

    // Refused immediately while open, without calling the operation.
    let refused = guard.execute("wikipedia_search", op).await.unwrap_err();
    assert!(refused.is_circuit_open());
    assert_eq!(refused.attempts(), 0);
    assert!(refused.last_error().is_none());

    tokio::time::advance(Duration::from_secs(61)).await;
    healthy.store(true, Ordering::SeqCst);

    let page = guard.execute("wikipedia_search", op).await.unwrap();
    assert_eq!(page, "page");
    assert_eq!(guard.orchestrator().breaker().state(), CircuitState::Closed);
    assert_eq!(guard.orchestrator().breaker().failure_count(), 0);

    let exhausted = events
        .0
        .lock()
        .iter()
        .filter(|e| e.event_type() == "retry_exhausted")
        .count();
    assert_eq!(exhausted, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_call_does_not_trip_breaker() {
    let guard = Guard::new(config(3, 1)).without_sink();

    let slow = guard.execute("vector_search", || async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, Failure>(())
    });
    let outcome = tokio::time::timeout(Duration::from_secs(1), slow).await;
    assert!(outcome.is_err());

    assert_eq!(guard.orchestrator().breaker().state(), CircuitState::Closed);
    assert_eq!(guard.orchestrator().breaker().failure_count(), 0);
}

#[tokio::test]
async fn test_health_report_serializes() {
    let guard = Guard::default();
    let json = serde_json::to_value(guard.health()).unwrap();

    assert_eq!(json["status"], "excellent");
    assert_eq!(json["operational"], true);
    assert_eq!(json["error_recovery"]["success_rate_percent"], 100.0);
    assert_eq!(json["error_recovery"]["circuit_breaker"]["state"], "CLOSED");
    assert_eq!(json["cache"]["hit_rate_percent"], 0.0);
    assert_eq!(json["cache"]["max_size"], 1000);
    assert_eq!(json["cache"]["default_ttl_secs"], 3600);
}
