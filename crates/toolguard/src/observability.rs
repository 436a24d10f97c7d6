//! Structured logging for guarded calls
//!
//! [`TracingSink`] turns every retry lifecycle event into a `tracing` record,
//! so a process that only wants logs does not need a custom
//! [`EventSink`]. With the `trace` feature, [`init_tracing`] installs a
//! formatting subscriber filtered by `RUST_LOG`.

use async_trait::async_trait;
use toolguard_core::retry::{EventSink, ExhaustReason, RetryEvent};
use tracing::{debug, error, info, warn};

/// An [`EventSink`] that logs each event with structured fields.
///
/// Retries and successes log at `info`, refusals by the breaker at `warn`,
/// permanent failures at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn on_event(&self, event: RetryEvent) {
        log_event(&event);
    }
}

fn log_event(event: &RetryEvent) {
    match event {
        RetryEvent::Attempt {
            attempt,
            max_attempts,
            operation,
        } => {
            debug!(
                event = event.event_type(),
                operation = %operation,
                attempt,
                max_attempts,
                "Retrying {}", operation
            );
        }
        RetryEvent::Success {
            attempt,
            max_attempts,
            operation,
        } => {
            info!(
                event = event.event_type(),
                operation = %operation,
                attempt,
                max_attempts,
                "{} succeeded after retry", operation
            );
        }
        RetryEvent::Delay {
            attempt,
            max_attempts,
            operation,
            delay,
            failure_kind,
        } => {
            info!(
                event = event.event_type(),
                operation = %operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                failure_kind = %failure_kind,
                "Backing off before next attempt"
            );
        }
        RetryEvent::Exhausted {
            attempt,
            max_attempts,
            operation,
            failure_kind,
            final_error,
            reason,
        } => {
            let kind = failure_kind.map(|k| k.as_str()).unwrap_or("none");
            let final_error = final_error.as_deref().unwrap_or("");
            if *reason == ExhaustReason::CircuitOpen {
                warn!(
                    event = event.event_type(),
                    operation = %operation,
                    attempt,
                    max_attempts,
                    failure_kind = kind,
                    reason = ?reason,
                    final_error,
                    "Circuit breaker stopped {}", operation
                );
            } else {
                error!(
                    event = event.event_type(),
                    operation = %operation,
                    attempt,
                    max_attempts,
                    failure_kind = kind,
                    reason = ?reason,
                    final_error,
                    "{} gave up", operation
                );
            }
        }
    }
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` if a global subscriber was already set.
#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub fn init_tracing() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use std::time::Duration;
    use toolguard_core::retry::FailureKind;

    fn all_events() -> Vec<RetryEvent> {
        vec![
            RetryEvent::Attempt {
                attempt: 2,
                max_attempts: 3,
                operation: "tavily_search".into(),
            },
            RetryEvent::Delay {
                attempt: 1,
                max_attempts: 3,
                operation: "tavily_search".into(),
                delay: Duration::from_secs(2),
                failure_kind: FailureKind::RateLimit,
            },
            RetryEvent::Success {
                attempt: 2,
                max_attempts: 3,
                operation: "tavily_search".into(),
            },
            RetryEvent::Exhausted {
                attempt: 3,
                max_attempts: 3,
                operation: "tavily_search".into(),
                failure_kind: Some(FailureKind::RateLimit),
                final_error: Some("status 429: slow down".into()),
                reason: ExhaustReason::AttemptsExhausted,
            },
            RetryEvent::Exhausted {
                attempt: 0,
                max_attempts: 3,
                operation: "wikipedia_search".into(),
                failure_kind: None,
                final_error: None,
                reason: ExhaustReason::CircuitOpen,
            },
        ]
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn line_containing(&self, needle: &str) -> String {
            let bytes = self.0.lock().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .find(|line| line.contains(needle))
                .unwrap_or_else(|| panic!("no log line contains {needle:?}"))
                .to_string()
        }
    }

    impl io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_tracing_sink_logs_every_event() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let sink = TracingSink;
        for event in all_events() {
            sink.on_event(event).await;
        }

        let attempt = log.line_containing("Retrying tavily_search");
        assert!(attempt.contains("DEBUG"), "{attempt}");

        let delay = log.line_containing("Backing off before next attempt");
        assert!(delay.contains("INFO"), "{delay}");
        assert!(delay.contains("delay_ms=2000"), "{delay}");
        assert!(delay.contains("rate_limit"), "{delay}");

        let success = log.line_containing("tavily_search succeeded after retry");
        assert!(success.contains("INFO"), "{success}");

        let gave_up = log.line_containing("tavily_search gave up");
        assert!(gave_up.contains("ERROR"), "{gave_up}");
        assert!(gave_up.contains("rate_limit"), "{gave_up}");
        assert!(gave_up.contains("status 429: slow down"), "{gave_up}");

        let refused = log.line_containing("Circuit breaker stopped wikipedia_search");
        assert!(refused.contains("WARN"), "{refused}");
        assert!(refused.contains("CircuitOpen"), "{refused}");
    }
}
