//! Retry policy and per-kind backoff curves.

use super::classify::FailureKind;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Why a [`RetryPolicyBuilder`] refused to build.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// `base_delay` must be positive.
    #[error("base_delay must be greater than zero")]
    ZeroBaseDelay,

    /// `max_delay` must not be shorter than `base_delay`.
    #[error("max_delay ({max:?}) is shorter than base_delay ({base:?})")]
    MaxDelayBelowBase {
        /// Configured base delay
        base: Duration,
        /// Configured maximum delay
        max: Duration,
    },

    /// `exponential_base` must be a finite number above 1.
    #[error("exponential_base must be a finite number greater than 1, got {0}")]
    InvalidExponentialBase(f64),

    /// `jitter_factor` must be a number in `[0, 1]`.
    #[error("jitter_factor must be within [0, 1], got {0}")]
    InvalidJitter(f64),
}

/// How many times to try, how long to wait, and which failures are worth
/// another attempt.
///
/// The wait before attempt `n + 1` depends on the kind of the failure seen on
/// attempt `n`:
///
/// ```text
/// RateLimit:  base * exponential_base ^ n
/// Overload:   base * (n + 1) * 2
/// otherwise:  base * exponential_base ^ (n - 1)
///
/// delay += delay * jitter_factor * random(0, 1)
/// delay  = clamp(delay, 0, max_delay)
/// ```
///
/// Rate limits escalate fastest because the server asked us to back off.
/// Overload grows linearly so recovery is tested sooner.
///
/// # Examples
///
/// ```rust
/// use toolguard_core::retry::{FailureKind, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(3)
///     .base_delay(Duration::from_secs(1))
///     .jitter_factor(0.0)
///     .build()
///     .unwrap();
///
/// assert_eq!(policy.delay(1, FailureKind::RateLimit), Duration::from_secs(2));
/// assert_eq!(policy.delay(2, FailureKind::RateLimit), Duration::from_secs(4));
/// assert_eq!(policy.delay(1, FailureKind::Overload), Duration::from_secs(4));
/// assert_eq!(policy.delay(1, FailureKind::ServerError), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter_factor: f64,
    retryable_kinds: BTreeSet<FailureKind>,
}

impl RetryPolicy {
    /// Create a new builder.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// A builder pre-filled with this policy's settings.
    pub fn to_builder(&self) -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: Some(self.max_attempts),
            base_delay: Some(self.base_delay),
            max_delay: Some(self.max_delay),
            exponential_base: Some(self.exponential_base),
            jitter_factor: Some(self.jitter_factor),
            retryable_kinds: Some(self.retryable_kinds.clone()),
        }
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Base unit of every backoff curve.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Growth factor of the exponential curves.
    pub fn exponential_base(&self) -> f64 {
        self.exponential_base
    }

    /// Fraction of the computed delay that may be added as random jitter.
    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Kinds that are worth another attempt.
    pub fn retryable_kinds(&self) -> &BTreeSet<FailureKind> {
        &self.retryable_kinds
    }

    /// Whether a failure of this kind may be retried.
    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// Delay to wait after `attempt` (1-based) failed with `kind`.
    ///
    /// Always within `[0, max_delay]`.
    pub fn delay(&self, attempt: u32, kind: FailureKind) -> Duration {
        self.delay_with_roll(attempt, kind, rand::random::<f64>())
    }

    pub(crate) fn delay_with_roll(&self, attempt: u32, kind: FailureKind, roll: f64) -> Duration {
        let mut delay = self.curve(attempt.max(1), kind);
        delay += delay * self.jitter_factor * roll.clamp(0.0, 1.0);

        if delay.is_nan() {
            return self.max_delay;
        }
        // Anything past what a Duration can hold saturates at the cap.
        Duration::try_from_secs_f64(delay.max(0.0))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    fn curve(&self, attempt: u32, kind: FailureKind) -> f64 {
        let base = self.base_delay.as_secs_f64();
        let exponent = |n: u32| i32::try_from(n).unwrap_or(i32::MAX);
        match kind {
            FailureKind::RateLimit => base * self.exponential_base.powi(exponent(attempt)),
            FailureKind::Overload => base * f64::from(attempt.saturating_add(1)) * 2.0,
            _ => base * self.exponential_base.powi(exponent(attempt - 1)),
        }
    }
}

impl Default for RetryPolicy {
    /// Defaults:
    /// - `max_attempts`: 5
    /// - `base_delay`: 1s
    /// - `max_delay`: 60s
    /// - `exponential_base`: 2.0
    /// - `jitter_factor`: 0.1
    /// - retryable: rate limit, server error, overload, network, timeout
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter_factor: 0.1,
            retryable_kinds: default_retryable_kinds(),
        }
    }
}

fn default_retryable_kinds() -> BTreeSet<FailureKind> {
    [
        FailureKind::RateLimit,
        FailureKind::ServerError,
        FailureKind::Overload,
        FailureKind::Network,
        FailureKind::Timeout,
    ]
    .into_iter()
    .collect()
}

/// Builder for [`RetryPolicy`].
///
/// Unset fields take the [`RetryPolicy::default`] values.
///
/// # Examples
///
/// ```rust
/// use toolguard_core::retry::{FailureKind, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::builder()
///     .max_attempts(4)
///     .base_delay(Duration::from_millis(250))
///     .max_delay(Duration::from_secs(10))
///     .no_retry_on(FailureKind::Overload)
///     .build()
///     .unwrap();
///
/// assert!(!policy.is_retryable(FailureKind::Overload));
/// assert!(policy.is_retryable(FailureKind::RateLimit));
/// ```
#[derive(Debug, Default, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    exponential_base: Option<f64>,
    jitter_factor: Option<f64>,
    retryable_kinds: Option<BTreeSet<FailureKind>>,
}

impl RetryPolicyBuilder {
    /// Set the total number of attempts.
    ///
    /// Default: 5
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the base delay.
    ///
    /// Default: 1s
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the maximum delay.
    ///
    /// Default: 60s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the exponential growth factor.
    ///
    /// Default: 2.0
    pub fn exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = Some(base);
        self
    }

    /// Set the jitter factor. Values outside `[0, 1]` are clamped.
    ///
    /// Default: 0.1
    pub fn jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = Some(jitter.clamp(0.0, 1.0));
        self
    }

    /// Replace the set of retryable kinds.
    pub fn retryable_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retryable_kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Add a kind to the retryable set.
    pub fn retry_on(mut self, kind: FailureKind) -> Self {
        self.retryable_kinds
            .get_or_insert_with(default_retryable_kinds)
            .insert(kind);
        self
    }

    /// Remove a kind from the retryable set.
    pub fn no_retry_on(mut self, kind: FailureKind) -> Self {
        self.retryable_kinds
            .get_or_insert_with(default_retryable_kinds)
            .remove(&kind);
        self
    }

    /// Validate and build the policy.
    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        let defaults = RetryPolicy::default();
        let policy = RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            exponential_base: self.exponential_base.unwrap_or(defaults.exponential_base),
            jitter_factor: self.jitter_factor.unwrap_or(defaults.jitter_factor),
            retryable_kinds: self.retryable_kinds.unwrap_or(defaults.retryable_kinds),
        };

        if policy.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if policy.base_delay.is_zero() {
            return Err(PolicyError::ZeroBaseDelay);
        }
        if policy.max_delay < policy.base_delay {
            return Err(PolicyError::MaxDelayBelowBase {
                base: policy.base_delay,
                max: policy.max_delay,
            });
        }
        if !policy.exponential_base.is_finite() || policy.exponential_base <= 1.0 {
            return Err(PolicyError::InvalidExponentialBase(policy.exponential_base));
        }
        if !(0.0..=1.0).contains(&policy.jitter_factor) {
            return Err(PolicyError::InvalidJitter(policy.jitter_factor));
        }

        Ok(policy)
    }
}
