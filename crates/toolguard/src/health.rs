//! Combined health snapshot for a status endpoint.

use crate::cache::CacheStats;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use toolguard_core::retry::{CircuitState, RetryStats};

/// Success rate below which the layer is reported as [`HealthStatus::Warning`].
pub const WARNING_SUCCESS_RATE: f64 = 80.0;

/// Success rate at or above which the layer is reported as [`HealthStatus::Excellent`].
pub const EXCELLENT_SUCCESS_RATE: f64 = 95.0;

/// Recent failures above which the layer is reported as [`HealthStatus::Degraded`].
pub const DEGRADED_RECENT_FAILURES: usize = 10;

/// Overall verdict, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// The circuit breaker is open
    Critical,
    /// Fewer than 80% of calls succeed
    Warning,
    /// More than 10 failed attempts inside the stats window
    Degraded,
    /// Healthy, below the excellent threshold
    Good,
    /// At least 95% of calls succeed
    Excellent,
}

impl HealthStatus {
    /// Grade retry stats. Checks run in order: breaker, success rate,
    /// recent failures.
    pub fn assess(stats: &RetryStats) -> Self {
        if stats.circuit_breaker.state == CircuitState::Open {
            HealthStatus::Critical
        } else if stats.success_rate_percent < WARNING_SUCCESS_RATE {
            HealthStatus::Warning
        } else if stats.recent_failures > DEGRADED_RECENT_FAILURES {
            HealthStatus::Degraded
        } else if stats.success_rate_percent >= EXCELLENT_SUCCESS_RATE {
            HealthStatus::Excellent
        } else {
            HealthStatus::Good
        }
    }

    /// Whether calls are currently expected to go through.
    pub fn is_operational(self) -> bool {
        self != HealthStatus::Critical
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Critical => "critical",
            HealthStatus::Warning => "warning",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Good => "good",
            HealthStatus::Excellent => "excellent",
        };
        f.write_str(name)
    }
}

/// Everything a status endpoint needs, in one serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall verdict
    pub status: HealthStatus,
    /// False only while the verdict is critical
    pub operational: bool,
    /// Retry and breaker stats
    pub error_recovery: RetryStats,
    /// Cache counters
    pub cache: CacheStats,
    /// When the report was taken
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Build a report from the two stat snapshots.
    pub fn new(error_recovery: RetryStats, cache: CacheStats) -> Self {
        let status = HealthStatus::assess(&error_recovery);
        Self {
            status,
            operational: status.is_operational(),
            error_recovery,
            cache,
            generated_at: Utc::now(),
        }
    }
}
