//! Three-state circuit breaker.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation; attempts are allowed.
    Closed,
    /// Failing fast; attempts are refused until the recovery timeout passes.
    Open,
    /// A single trial attempt is probing whether the remote side recovered.
    HalfOpen,
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures needed to trip a closed breaker. At least 1.
    pub failure_threshold: u32,
    /// Time an open breaker waits before admitting a trial.
    pub recovery_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of a breaker, for stats and health output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    /// Current state
    pub state: CircuitState,
    /// Current failure pressure
    pub failure_count: u32,
    /// Wall-clock time of the most recent failure
    pub last_failure_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    last_failure_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            last_failure_at: None,
            trial_in_flight: false,
        }
    }

    fn recovery_due(&self, timeout: Duration) -> bool {
        self.last_failure
            .is_none_or(|at| Instant::now().saturating_duration_since(at) >= timeout)
    }
}

/// A circuit breaker guarding one remote dependency.
///
/// - **Closed**: every failure adds to `failure_count`; reaching the
///   threshold opens the breaker. Every success takes one off the count, so
///   isolated blips decay instead of accumulating.
/// - **Open**: attempts are refused until `recovery_timeout` has passed
///   since the last failure, then one trial is admitted and the breaker goes
///   half-open.
/// - **HalfOpen**: one trial at a time. Success closes the breaker and clears
///   the count; failure reopens it with a fresh timestamp.
///
/// State is behind a mutex so concurrent callers see linearizable
/// transitions. The lock is never held across an `.await`.
///
/// # Examples
///
/// ```rust
/// use toolguard_core::retry::{BreakerConfig, CircuitBreaker, CircuitState};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(BreakerConfig {
///     failure_threshold: 2,
///     recovery_timeout: Duration::from_secs(30),
/// });
///
/// breaker.record_failure();
/// breaker.record_success();
/// breaker.record_failure();
/// assert_eq!(breaker.state(), CircuitState::Closed);
///
/// breaker.record_failure();
/// assert_eq!(breaker.state(), CircuitState::Open);
/// assert!(breaker.acquire().is_none());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker. A zero threshold is raised to 1.
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config: BreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    /// The thresholds this breaker runs with.
    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Current state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Current failure count.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Snapshot for reporting.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_at,
        }
    }

    /// Ask to make an attempt.
    ///
    /// Returns `None` when the breaker refuses. The returned permit should be
    /// settled with [`BreakerPermit::success`] or [`BreakerPermit::failure`];
    /// dropping it unsettled (a cancelled attempt) records nothing.
    pub fn acquire(&self) -> Option<BreakerPermit<'_>> {
        let mut inner = self.inner.lock();
        let current = inner.state;
        let trial = match current {
            CircuitState::Closed => false,
            CircuitState::Open => {
                // A trial admitted before a late failure reopened the
                // breaker still owns the slot.
                if inner.trial_in_flight || !inner.recovery_due(self.config.recovery_timeout) {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                info!("Circuit breaker moving to HALF_OPEN state");
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                true
            }
        };
        if trial {
            inner.trial_in_flight = true;
        }

        Some(BreakerPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Whether [`acquire`](Self::acquire) would currently admit an attempt.
    ///
    /// Does not change state.
    pub fn would_admit(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                !inner.trial_in_flight && inner.recovery_due(self.config.recovery_timeout)
            }
            CircuitState::HalfOpen => !inner.trial_in_flight,
        }
    }

    /// Record a success that did not go through a permit.
    pub fn record_success(&self) {
        self.on_success(false);
    }

    /// Record a failure that did not go through a permit.
    pub fn record_failure(&self) {
        self.on_failure(false);
    }

    /// Force the breaker closed and forget all failures.
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::closed();
        info!("Circuit breaker reset");
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
        }
        let current = inner.state;
        match current {
            CircuitState::HalfOpen => {
                *inner = BreakerState::closed();
                info!("Circuit breaker closed after successful recovery");
            }
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
        }
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.last_failure_at = Some(Utc::now());

        let current = inner.state;
        match current {
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                inner.state = CircuitState::Open;
                warn!(
                    failure_count = inner.failure_count,
                    "Circuit breaker opened after {} failures", inner.failure_count
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                warn!(
                    failure_count = inner.failure_count,
                    "Circuit breaker re-opened after failed recovery trial"
                );
            }
            _ => {}
        }
    }

    fn release_trial(&self) {
        self.inner.lock().trial_in_flight = false;
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

/// Permission to make one attempt, handed out by [`CircuitBreaker::acquire`].
#[derive(Debug)]
#[must_use = "settle the permit with success() or failure()"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl BreakerPermit<'_> {
    /// Whether this is the half-open recovery trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// The attempt succeeded.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    /// The attempt failed.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.release_trial();
        }
    }
}
