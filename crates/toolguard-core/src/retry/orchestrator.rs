//! The retry loop.

use super::breaker::{BreakerConfig, CircuitBreaker};
use super::classify::{Classify, FailureKind, classify};
use super::error::RetryError;
use super::event::{EventSink, ExhaustReason, RetryEvent};
use super::policy::RetryPolicy;
use super::stats::{PolicySummary, RetryAttemptRecord, RetryStats, round_percent};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Failed attempts kept in memory for stats.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Window used by [`RetryOrchestrator::stats`].
pub const DEFAULT_STATS_WINDOW: Duration = Duration::from_secs(3600);

const ERROR_SUMMARY_LIMIT: usize = 200;

/// Runs operations with retries, backoff and a circuit breaker.
///
/// One orchestrator guards one remote dependency. It is meant to be built
/// once and shared (for example in an `Arc`); concurrent calls share the
/// breaker and the stats while each call's attempts stay strictly
/// sequential.
///
/// # Cancellation
///
/// Dropping the future returned by
/// [`execute_with_retry`](Self::execute_with_retry) aborts the current
/// attempt or backoff sleep. A cancelled attempt is not a failure: breaker
/// counters are left alone and a pending half-open trial slot is released.
///
/// # Examples
///
/// ```rust
/// use toolguard_core::prelude::*;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = RetryOrchestrator::new(
///     RetryPolicy::builder()
///         .max_attempts(3)
///         .base_delay(Duration::from_millis(10))
///         .build()?,
/// );
///
/// let calls = Arc::new(AtomicU32::new(0));
/// let result = orchestrator
///     .execute("wikipedia_search", || {
///         let calls = Arc::clone(&calls);
///         async move {
///             if calls.fetch_add(1, Ordering::SeqCst) == 0 {
///                 Err(Failure::with_status(503, "unavailable"))
///             } else {
///                 Ok("Ferris is a crab")
///             }
///         }
///     })
///     .await?;
///
/// assert_eq!(result, "Ferris is a crab");
/// assert_eq!(calls.load(Ordering::SeqCst), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RetryOrchestrator {
    policy: RetryPolicy,
    breaker: CircuitBreaker,
    history: Mutex<VecDeque<RetryAttemptRecord>>,
    history_capacity: usize,
    success_count: AtomicU64,
    total_attempts: AtomicU64,
}

impl RetryOrchestrator {
    /// Create an orchestrator with a default breaker (5 failures, 60s).
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            breaker: CircuitBreaker::default(),
            history: Mutex::new(VecDeque::new()),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            success_count: AtomicU64::new(0),
            total_attempts: AtomicU64::new(0),
        }
    }

    /// Replace the breaker thresholds.
    pub fn with_breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(config);
        self
    }

    /// Bound the number of failed attempts kept for stats.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// The retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// [`execute_with_retry`](Self::execute_with_retry) without an event sink.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        self.execute_with_retry(operation_name, None, operation)
            .await
    }

    /// Run `operation` until it succeeds, fails with a non-retryable kind,
    /// runs out of attempts, or the breaker refuses.
    ///
    /// `operation` is called once per attempt and must produce a fresh
    /// future each time. Synchronous work can return
    /// [`std::future::ready`].
    ///
    /// Events are delivered to `sink` in order:
    /// `retry_attempt` before every attempt after the first, `retry_delay`
    /// before each backoff sleep, `retry_success` when a retry succeeds, and
    /// `retry_exhausted` when the call gives up.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation_name: &str,
        sink: Option<&dyn EventSink>,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
        let max_attempts = self.policy.max_attempts();
        let mut last_error: Option<(E, FailureKind)> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let Some(permit) = self.breaker.acquire() else {
                let attempts = attempt - 1;
                warn!(
                    operation = operation_name,
                    attempts, "Circuit breaker open; refusing {}", operation_name
                );
                let (last_error, kind) = match last_error {
                    Some((error, kind)) => (Some(error), Some(kind)),
                    None => (None, None),
                };
                emit(
                    sink,
                    RetryEvent::Exhausted {
                        attempt: attempts,
                        max_attempts,
                        operation: operation_name.to_string(),
                        failure_kind: kind,
                        final_error: last_error.as_ref().map(ToString::to_string),
                        reason: ExhaustReason::CircuitOpen,
                    },
                )
                .await;
                return Err(RetryError::CircuitOpen {
                    operation: operation_name.to_string(),
                    attempts,
                    kind,
                    last_error,
                });
            };

            if attempt > 1 {
                emit(
                    sink,
                    RetryEvent::Attempt {
                        attempt,
                        max_attempts,
                        operation: operation_name.to_string(),
                    },
                )
                .await;
            }

            let error = match operation().await {
                Ok(value) => {
                    permit.success();
                    self.success_count.fetch_add(1, Ordering::Relaxed);
                    if attempt > 1 {
                        info!(
                            operation = operation_name,
                            attempt, "{} succeeded on attempt {}", operation_name, attempt
                        );
                        emit(
                            sink,
                            RetryEvent::Success {
                                attempt,
                                max_attempts,
                                operation: operation_name.to_string(),
                            },
                        )
                        .await;
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = classify(&error);
            permit.failure();
            warn!(
                operation = operation_name,
                attempt,
                max_attempts,
                failure_kind = %kind,
                error = %error,
                "{} failed on attempt {}", operation_name, attempt
            );

            let stop = if attempt >= max_attempts {
                Some(ExhaustReason::AttemptsExhausted)
            } else if !self.policy.is_retryable(kind) {
                Some(ExhaustReason::NonRetryable)
            } else if !self.breaker.would_admit() {
                Some(ExhaustReason::CircuitOpen)
            } else {
                None
            };

            if let Some(reason) = stop {
                self.record_attempt(operation_name, attempt, Duration::ZERO, kind, &error);
                error!(
                    operation = operation_name,
                    attempts = attempt,
                    failure_kind = %kind,
                    ?reason,
                    "{} failed permanently after {} attempts", operation_name, attempt
                );
                emit(
                    sink,
                    RetryEvent::Exhausted {
                        attempt,
                        max_attempts,
                        operation: operation_name.to_string(),
                        failure_kind: Some(kind),
                        final_error: Some(error.to_string()),
                        reason,
                    },
                )
                .await;
                return Err(RetryError::stopped(
                    reason,
                    operation_name,
                    attempt,
                    kind,
                    error,
                ));
            }

            let delay = self.policy.delay(attempt, kind);
            self.record_attempt(operation_name, attempt, delay, kind, &error);
            emit(
                sink,
                RetryEvent::Delay {
                    attempt,
                    max_attempts,
                    operation: operation_name.to_string(),
                    delay,
                    failure_kind: kind,
                },
            )
            .await;
            info!(
                operation = operation_name,
                delay_ms = delay.as_millis() as u64,
                "Retrying {} in {:.2}s (attempt {}/{})",
                operation_name,
                delay.as_secs_f64(),
                attempt + 1,
                max_attempts
            );
            last_error = Some((error, kind));
            tokio::time::sleep(delay).await;
        }
    }

    /// Stats over the last hour.
    pub fn stats(&self) -> RetryStats {
        self.stats_within(DEFAULT_STATS_WINDOW)
    }

    /// Stats with failure counts limited to `window`.
    pub fn stats_within(&self, window: Duration) -> RetryStats {
        let recent = self.recent_failures(window);
        let mut failure_kind_counts = BTreeMap::new();
        for record in &recent {
            *failure_kind_counts.entry(record.failure_kind).or_insert(0) += 1;
        }

        let success_count = self.success_count.load(Ordering::Relaxed);
        let total_attempts = self.total_attempts.load(Ordering::Relaxed);
        let success_rate_percent = if total_attempts > 0 {
            round_percent(success_count as f64 / total_attempts as f64 * 100.0)
        } else {
            100.0
        };

        RetryStats {
            success_count,
            total_attempts,
            success_rate_percent,
            recent_failures: recent.len(),
            failure_kind_counts,
            window_secs: window.as_secs(),
            circuit_breaker: self.breaker.snapshot(),
            policy: PolicySummary {
                max_attempts: self.policy.max_attempts(),
                base_delay_secs: self.policy.base_delay().as_secs_f64(),
                max_delay_secs: self.policy.max_delay().as_secs_f64(),
            },
        }
    }

    /// Failed attempts recorded within `window`, oldest first.
    pub fn recent_failures(&self, window: Duration) -> Vec<RetryAttemptRecord> {
        let now = Instant::now();
        self.history
            .lock()
            .iter()
            .filter(|record| now.saturating_duration_since(record.recorded_at) <= window)
            .cloned()
            .collect()
    }

    fn record_attempt<E: fmt::Display>(
        &self,
        operation: &str,
        attempt: u32,
        delay: Duration,
        kind: FailureKind,
        error: &E,
    ) {
        let record = RetryAttemptRecord {
            operation: operation.to_string(),
            attempt_number: attempt,
            delay,
            failure_kind: kind,
            timestamp: Utc::now(),
            error_summary: summarize(error),
            recorded_at: Instant::now(),
        };

        let mut history = self.history.lock();
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(record);
    }
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

async fn emit(sink: Option<&dyn EventSink>, event: RetryEvent) {
    if let Some(sink) = sink {
        sink.on_event(event).await;
    }
}

fn summarize<E: fmt::Display>(error: &E) -> String {
    let text = error.to_string();
    match text.char_indices().nth(ERROR_SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
