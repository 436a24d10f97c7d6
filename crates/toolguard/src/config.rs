//! Configuration for the guard layer

use crate::cache::{DEFAULT_MAX_SIZE, DEFAULT_TTL};
use std::time::Duration;
use toolguard_core::retry::{
    BreakerConfig, DEFAULT_HISTORY_CAPACITY, DEFAULT_STATS_WINDOW, RetryPolicy,
};

/// Configuration for a [`Guard`](crate::Guard).
///
/// Every field has a sensible default, so the usual starting point is
/// `GuardConfig::default()` or [`GuardConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuardConfig {
    /// Retry policy applied to every guarded call
    pub retry: RetryPolicy,

    /// Circuit breaker thresholds
    pub breaker: BreakerConfig,

    /// Response cache limits
    pub cache: CacheConfig,

    /// Retry history retention
    pub history: HistoryConfig,
}

/// Response cache limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries before eviction kicks in
    pub max_size: usize,

    /// TTL used when a store does not name its own
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
        }
    }
}

/// How much retry history is kept for stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum failed-attempt records kept in memory
    pub capacity: usize,

    /// Window the health report's failure counts cover
    pub stats_window: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            stats_window: DEFAULT_STATS_WINDOW,
        }
    }
}

impl GuardConfig {
    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the breaker thresholds.
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Replace the cache limits.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the history settings.
    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first, if present.
    /// Unset variables keep their defaults. This will look for:
    /// - `TOOLGUARD_MAX_ATTEMPTS` for the total attempts per call
    /// - `TOOLGUARD_BASE_DELAY_MS` and `TOOLGUARD_MAX_DELAY_MS` for the backoff bounds
    /// - `TOOLGUARD_EXPONENTIAL_BASE` for the backoff growth factor
    /// - `TOOLGUARD_JITTER` for the jitter factor (0 to 1)
    /// - `TOOLGUARD_FAILURE_THRESHOLD` for failures before the breaker opens
    /// - `TOOLGUARD_RECOVERY_TIMEOUT_SECS` for how long the breaker stays open
    /// - `TOOLGUARD_CACHE_MAX_SIZE` for the cache capacity
    /// - `TOOLGUARD_CACHE_TTL_SECS` for the default cache TTL
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) when a
    /// variable is set but unusable, and
    /// [`Error::InvalidPolicy`](crate::Error::InvalidPolicy) when the
    /// combined retry settings are inconsistent.
    #[cfg(feature = "env")]
    pub fn from_env() -> crate::Result<Self> {
        use crate::Error;

        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        // Retry policy
        let mut retry = config.retry.to_builder();
        if let Some(max_attempts) = env_parse::<u32>("TOOLGUARD_MAX_ATTEMPTS")? {
            retry = retry.max_attempts(max_attempts);
        }
        if let Some(base_ms) = env_parse::<u64>("TOOLGUARD_BASE_DELAY_MS")? {
            retry = retry.base_delay(Duration::from_millis(base_ms));
        }
        if let Some(max_ms) = env_parse::<u64>("TOOLGUARD_MAX_DELAY_MS")? {
            retry = retry.max_delay(Duration::from_millis(max_ms));
        }
        if let Some(base) = env_parse::<f64>("TOOLGUARD_EXPONENTIAL_BASE")? {
            retry = retry.exponential_base(base);
        }
        if let Some(jitter) = env_parse::<f64>("TOOLGUARD_JITTER")? {
            if !(0.0..=1.0).contains(&jitter) {
                return Err(Error::invalid_config(
                    "TOOLGUARD_JITTER",
                    format!("must be within [0, 1], got {jitter}"),
                ));
            }
            retry = retry.jitter_factor(jitter);
        }
        config.retry = retry.build()?;

        // Circuit breaker
        if let Some(threshold) = env_parse::<u32>("TOOLGUARD_FAILURE_THRESHOLD")? {
            if threshold == 0 {
                return Err(Error::invalid_config(
                    "TOOLGUARD_FAILURE_THRESHOLD",
                    "must be at least 1",
                ));
            }
            config.breaker.failure_threshold = threshold;
        }
        if let Some(secs) = env_parse::<u64>("TOOLGUARD_RECOVERY_TIMEOUT_SECS")? {
            if secs == 0 {
                return Err(Error::invalid_config(
                    "TOOLGUARD_RECOVERY_TIMEOUT_SECS",
                    "must be greater than zero",
                ));
            }
            config.breaker.recovery_timeout = Duration::from_secs(secs);
        }

        // Cache
        if let Some(max_size) = env_parse::<usize>("TOOLGUARD_CACHE_MAX_SIZE")? {
            if max_size == 0 {
                return Err(Error::invalid_config(
                    "TOOLGUARD_CACHE_MAX_SIZE",
                    "must be at least 1",
                ));
            }
            config.cache.max_size = max_size;
        }
        if let Some(secs) = env_parse::<u64>("TOOLGUARD_CACHE_TTL_SECS")? {
            if secs == 0 {
                return Err(Error::invalid_config(
                    "TOOLGUARD_CACHE_TTL_SECS",
                    "must be greater than zero",
                ));
            }
            config.cache.default_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

/// Read and parse one variable. Unset is `None`; set but unparseable is an error.
#[cfg(feature = "env")]
fn env_parse<T>(key: &str) -> crate::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    use std::env::{self, VarError};

    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| crate::Error::invalid_config(key, format!("'{raw}': {e}"))),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => {
            Err(crate::Error::invalid_config(key, "value is not valid unicode"))
        }
    }
}
