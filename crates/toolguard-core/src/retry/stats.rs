use super::breaker::BreakerSnapshot;
use super::classify::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// One failed attempt, kept for observability.
#[derive(Debug, Clone, Serialize)]
pub struct RetryAttemptRecord {
    /// Operation name
    pub operation: String,
    /// 1-based attempt number
    pub attempt_number: u32,
    /// Delay scheduled after this failure (zero when the call stopped)
    #[serde(serialize_with = "serialize_secs")]
    pub delay: Duration,
    /// Classified kind
    pub failure_kind: FailureKind,
    /// Wall-clock time of the failure
    pub timestamp: DateTime<Utc>,
    /// Truncated error text
    pub error_summary: String,
    #[serde(skip)]
    pub(crate) recorded_at: Instant,
}

/// Policy fields surfaced in [`RetryStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySummary {
    /// Total attempts allowed per call
    pub max_attempts: u32,
    /// Base delay in seconds
    pub base_delay_secs: f64,
    /// Maximum delay in seconds
    pub max_delay_secs: f64,
}

/// Read-only snapshot of an orchestrator, meant for a health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RetryStats {
    /// Calls that ended in success
    pub success_count: u64,
    /// Calls made (each `execute_with_retry` invocation counts once)
    pub total_attempts: u64,
    /// `success_count / total_attempts`, as a percentage; 100 with no calls
    pub success_rate_percent: f64,
    /// Failed attempts inside the window
    pub recent_failures: usize,
    /// Failed attempts inside the window, by kind
    pub failure_kind_counts: BTreeMap<FailureKind, usize>,
    /// Window the two fields above cover, in seconds
    pub window_secs: u64,
    /// Breaker state
    pub circuit_breaker: BreakerSnapshot,
    /// Policy limits
    pub policy: PolicySummary,
}

pub(crate) fn round_percent(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Durations go over the wire as fractional seconds.
pub(crate) fn serialize_secs<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(delay.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryEvent;

    #[test]
    fn test_round_percent() {
        assert_eq!(round_percent(66.666_666), 66.67);
        assert_eq!(round_percent(100.0), 100.0);
        assert_eq!(round_percent(0.0), 0.0);
    }

    #[test]
    fn test_record_and_event_delays_share_encoding() {
        let delay = Duration::from_millis(1500);
        let record = RetryAttemptRecord {
            operation: "tavily_search".into(),
            attempt_number: 1,
            delay,
            failure_kind: FailureKind::RateLimit,
            timestamp: Utc::now(),
            error_summary: "429".into(),
            recorded_at: Instant::now(),
        };
        let event = RetryEvent::Delay {
            attempt: 1,
            max_attempts: 3,
            operation: "tavily_search".into(),
            delay,
            failure_kind: FailureKind::RateLimit,
        };

        let record = serde_json::to_value(&record).unwrap();
        let event = serde_json::to_value(&event).unwrap();
        assert_eq!(record["delay"], 1.5);
        assert_eq!(record["delay"], event["delay"]);
    }
}
