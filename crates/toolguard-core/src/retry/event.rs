//! Retry lifecycle events.

use super::classify::FailureKind;
use super::stats::serialize_secs;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Why a call stopped retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    /// Every allowed attempt was used.
    AttemptsExhausted,
    /// The failure kind is not in the policy's retryable set.
    NonRetryable,
    /// The circuit breaker refused the next attempt.
    CircuitOpen,
}

/// A notification emitted while a call moves through the retry loop.
///
/// Serializes with a `type` tag of `retry_attempt`, `retry_success`,
/// `retry_delay` or `retry_exhausted`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum RetryEvent {
    /// A retry (attempt 2 or later) is about to run.
    #[serde(rename = "retry_attempt")]
    Attempt {
        /// 1-based attempt number
        attempt: u32,
        /// Policy limit
        max_attempts: u32,
        /// Operation name
        operation: String,
    },

    /// A retry succeeded.
    #[serde(rename = "retry_success")]
    Success {
        /// Attempt that succeeded
        attempt: u32,
        /// Policy limit
        max_attempts: u32,
        /// Operation name
        operation: String,
    },

    /// A failed attempt will be retried after `delay`.
    #[serde(rename = "retry_delay")]
    Delay {
        /// Attempt that failed
        attempt: u32,
        /// Policy limit
        max_attempts: u32,
        /// Operation name
        operation: String,
        /// Wait before the next attempt
        #[serde(serialize_with = "serialize_secs")]
        delay: Duration,
        /// Kind of the failure being retried
        failure_kind: FailureKind,
    },

    /// The call gave up.
    #[serde(rename = "retry_exhausted")]
    Exhausted {
        /// Last attempt made (0 if the breaker refused the first one)
        attempt: u32,
        /// Policy limit
        max_attempts: u32,
        /// Operation name
        operation: String,
        /// Kind of the last failure, if any attempt ran
        failure_kind: Option<FailureKind>,
        /// Text of the last failure, if any attempt ran
        final_error: Option<String>,
        /// Why the loop stopped
        reason: ExhaustReason,
    },
}

impl RetryEvent {
    /// The serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Attempt { .. } => "retry_attempt",
            RetryEvent::Success { .. } => "retry_success",
            RetryEvent::Delay { .. } => "retry_delay",
            RetryEvent::Exhausted { .. } => "retry_exhausted",
        }
    }

    /// Attempt number the event refers to.
    pub fn attempt(&self) -> u32 {
        match self {
            RetryEvent::Attempt { attempt, .. }
            | RetryEvent::Success { attempt, .. }
            | RetryEvent::Delay { attempt, .. }
            | RetryEvent::Exhausted { attempt, .. } => *attempt,
        }
    }

    /// Operation name the event refers to.
    pub fn operation(&self) -> &str {
        match self {
            RetryEvent::Attempt { operation, .. }
            | RetryEvent::Success { operation, .. }
            | RetryEvent::Delay { operation, .. }
            | RetryEvent::Exhausted { operation, .. } => operation,
        }
    }
}

/// Receives retry events, typically to log them or forward them to a client.
///
/// The orchestrator awaits each call in order, so a slow sink slows the
/// call it is observing.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handle one event.
    async fn on_event(&self, event: RetryEvent);
}

/// Adapts an async closure into an [`EventSink`].
///
/// ```rust
/// use toolguard_core::retry::{FnSink, RetryEvent};
///
/// let sink = FnSink(|event: RetryEvent| async move {
///     println!("{}: attempt {}", event.event_type(), event.attempt());
/// });
/// # let _ = sink;
/// ```
pub struct FnSink<F>(pub F);

#[async_trait]
impl<F, Fut> EventSink for FnSink<F>
where
    F: Fn(RetryEvent) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn on_event(&self, event: RetryEvent) {
        (self.0)(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_event_tags() {
        let event = RetryEvent::Delay {
            attempt: 1,
            max_attempts: 3,
            operation: "tavily_search".into(),
            delay: Duration::from_millis(2500),
            failure_kind: FailureKind::RateLimit,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "retry_delay");
        assert_eq!(json["delay"], 2.5);
        assert_eq!(json["failure_kind"], "rate_limit");
        assert_eq!(event.event_type(), "retry_delay");
        assert_eq!(event.operation(), "tavily_search");
    }

    #[test]
    fn test_exhausted_reason_serialized() {
        let event = RetryEvent::Exhausted {
            attempt: 0,
            max_attempts: 3,
            operation: "wiki".into(),
            failure_kind: None,
            final_error: None,
            reason: ExhaustReason::CircuitOpen,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "retry_exhausted");
        assert_eq!(json["reason"], "circuit_open");
        assert!(json["final_error"].is_null());
    }

    #[test]
    fn test_fn_sink_forwards_events() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let sink = FnSink(move |event: RetryEvent| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(event.attempt(), Ordering::SeqCst);
            }
        });

        tokio_test::block_on(sink.on_event(RetryEvent::Attempt {
            attempt: 2,
            max_attempts: 3,
            operation: "op".into(),
        }));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
