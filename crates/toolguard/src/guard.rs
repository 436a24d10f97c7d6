//! The guard facade: one cache and one orchestrator per process.

use crate::cache::{CacheParams, ResponseCache};
use crate::config::GuardConfig;
use crate::health::HealthReport;
use crate::observability::TracingSink;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use toolguard_core::retry::{Classify, EventSink, RetryError, RetryOrchestrator};
use tracing::debug;

/// Resilience layer for remote tool calls.
///
/// Build one at startup and share it as `Arc<Guard>`. Every call first
/// consults the response cache, then runs through the retry orchestrator
/// and its circuit breaker, and stores a successful result.
///
/// # Examples
///
/// ```rust
/// use toolguard::{Guard, GuardConfig};
/// use toolguard::cache::{CacheParams, ttl};
/// use toolguard_core::error::Failure;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let guard = Guard::new(GuardConfig::default());
/// let params = CacheParams::new().with("max_results", 3);
///
/// let results: Vec<String> = guard
///     .call("tavily", "rust async", &params, Some(ttl::WEB_SEARCH), || async {
///         Ok::<_, Failure>(vec!["tokio.rs".to_string()])
///     })
///     .await?;
/// assert_eq!(results.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Guard {
    config: GuardConfig,
    cache: ResponseCache,
    orchestrator: RetryOrchestrator,
    sink: Option<Arc<dyn EventSink>>,
}

impl Guard {
    /// Create a guard that logs retry events through `tracing`.
    pub fn new(config: GuardConfig) -> Self {
        let orchestrator = RetryOrchestrator::new(config.retry.clone())
            .with_breaker(config.breaker)
            .with_history_capacity(config.history.capacity);

        Self {
            cache: ResponseCache::new(config.cache),
            orchestrator,
            sink: Some(Arc::new(TracingSink)),
            config,
        }
    }

    /// Send retry events to `sink` instead of the log.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Emit no retry events.
    pub fn without_sink(mut self) -> Self {
        self.sink = None;
        self
    }

    /// The configuration the guard was built from.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// The response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The retry orchestrator.
    pub fn orchestrator(&self) -> &RetryOrchestrator {
        &self.orchestrator
    }

    /// Run a cacheable tool call.
    ///
    /// A cache hit for `namespace`/`query`/`params` returns immediately
    /// without calling `operation`. Otherwise the operation runs under the
    /// retry policy (named after `namespace`), and its result is stored for
    /// `ttl` (or the cache default).
    pub async fn call<T, E, F, Fut>(
        &self,
        namespace: &str,
        query: &str,
        params: &CacheParams,
        ttl: Option<Duration>,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        if let Some(cached) = self.cache.get_json::<T>(namespace, query, params) {
            debug!(namespace, "Serving tool call from cache");
            return Ok(cached);
        }

        let value = self.execute(namespace, operation).await?;
        self.cache.set_json(namespace, query, &value, ttl, params);
        Ok(value)
    }

    /// Run an operation under the retry policy, bypassing the cache.
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
        self.orchestrator
            .execute_with_retry(operation_name, self.sink.as_deref(), operation)
            .await
    }

    /// Snapshot retry, breaker and cache state.
    pub fn health(&self) -> HealthReport {
        HealthReport::new(
            self.orchestrator.stats_within(self.config.history.stats_window),
            self.cache.stats(),
        )
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("orchestrator", &self.orchestrator)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
