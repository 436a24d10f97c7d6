//! Capacity-bounded response cache with per-entry TTL.
//!
//! Responses are keyed by namespace (usually the tool name), query and a
//! [`CacheParams`] map. Expired entries are dropped lazily on read and on
//! every store. When the cache is full, a store first evicts the least
//! recently accessed fifth of the entries.
//!
//! Nothing here fails loudly: an entry that cannot be keyed or decoded is a
//! miss, and a value that cannot be encoded is not stored.

mod key;

pub use key::{CacheKey, CacheParams};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::CacheConfig;

/// Default number of entries before eviction.
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Per-namespace TTLs used by the built-in tools.
pub mod ttl {
    use std::time::Duration;

    /// Encyclopedia lookups change rarely.
    pub const WIKIPEDIA: Duration = Duration::from_secs(24 * 60 * 60);

    /// Web search results go stale quickly.
    pub const WEB_SEARCH: Duration = Duration::from_secs(30 * 60);

    /// Error payloads are cached briefly to avoid hammering a failing API.
    pub const ERROR_RESULT: Duration = Duration::from_secs(5 * 60);
}

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    created_at: Instant,
    ttl: Duration,
    access_count: u64,
    last_accessed_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();
        self.evictions += removed as u64;
        removed
    }

    fn evict_least_recent(&mut self, max_size: usize) -> usize {
        let len = self.entries.len();
        if len < max_size {
            return 0;
        }

        let mut by_access: Vec<(Instant, CacheKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_accessed_at, key.clone()))
            .collect();
        by_access.sort_unstable();

        let count = (len / 5).max(1);
        for (_, key) in by_access.into_iter().take(count) {
            self.entries.remove(&key);
        }
        self.evictions += count as u64;
        count
    }
}

/// Cache counters for a health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a value
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries removed by expiry, pressure or invalidation
    pub evictions: u64,
    /// Current number of entries
    pub size: usize,
    /// `hits / (hits + misses)`, as a percentage; 0 with no lookups
    pub hit_rate_percent: f64,
    /// `hits + misses`
    pub total_requests: u64,
    /// Configured capacity
    pub max_size: usize,
    /// Configured default TTL in seconds
    pub default_ttl_secs: u64,
}

/// In-memory response cache shared by all tools.
///
/// # Examples
///
/// ```rust
/// use toolguard::cache::{CacheParams, ResponseCache, ttl};
/// use serde_json::json;
///
/// let cache = ResponseCache::default();
/// let params = CacheParams::new().with("max_results", 3);
///
/// assert!(cache.set("tavily", "rust", json!(["a", "b"]), Some(ttl::WEB_SEARCH), &params));
/// assert_eq!(cache.get("tavily", "rust", &params), Some(json!(["a", "b"])));
/// assert_eq!(cache.get("tavily", "rust", &CacheParams::new()), None);
/// ```
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    max_size: usize,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Create a cache. `max_size` is raised to at least 1.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            max_size: config.max_size.max(1),
            default_ttl: config.default_ttl,
        }
    }

    /// Configured capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// TTL applied when a store does not name one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached response.
    ///
    /// An expired entry is removed and counted as both an eviction and a miss.
    pub fn get(&self, namespace: &str, query: &str, params: &CacheParams) -> Option<Value> {
        let key = match CacheKey::new(namespace, query, params) {
            Ok(key) => key,
            Err(e) => {
                debug!(namespace, error = %e, "Cache key derivation failed; treating as miss");
                self.inner.lock().misses += 1;
                return None;
            }
        };

        let now = Instant::now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get_mut(&key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                let value = entry.value.clone();
                inner.hits += 1;
                debug!(namespace, query = %preview(query), "Cache hit");
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.remove(&key);
            inner.evictions += 1;
        }
        inner.misses += 1;
        debug!(namespace, query = %preview(query), expired, "Cache miss");
        None
    }

    /// Store a response.
    ///
    /// `ttl` of `None` or zero uses the default. Returns `false` without
    /// storing when `value` is `null`.
    pub fn set(
        &self,
        namespace: &str,
        query: &str,
        value: Value,
        ttl: Option<Duration>,
        params: &CacheParams,
    ) -> bool {
        if value.is_null() {
            return false;
        }

        let key = match CacheKey::new(namespace, query, params) {
            Ok(key) => key,
            Err(e) => {
                debug!(namespace, error = %e, "Cache key derivation failed; not storing");
                return false;
            }
        };
        let ttl = ttl.filter(|ttl| !ttl.is_zero()).unwrap_or(self.default_ttl);

        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge_expired(now);
        inner.evict_least_recent(self.max_size);
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                ttl,
                access_count: 0,
                last_accessed_at: now,
            },
        );

        debug!(
            namespace,
            query = %preview(query),
            ttl_secs = ttl.as_secs(),
            size = inner.entries.len(),
            "Cache set"
        );
        true
    }

    /// Look up a cached response and decode it.
    ///
    /// A value that does not decode as `T` is a miss from the caller's view,
    /// though it already counted as a hit.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        namespace: &str,
        query: &str,
        params: &CacheParams,
    ) -> Option<T> {
        let value = self.get(namespace, query, params)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(namespace, error = %e, "Cached value did not decode");
                None
            }
        }
    }

    /// Encode and store a response. Returns `false` if encoding fails or
    /// the encoded value is `null`.
    pub fn set_json<T: Serialize + ?Sized>(
        &self,
        namespace: &str,
        query: &str,
        value: &T,
        ttl: Option<Duration>,
        params: &CacheParams,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(encoded) => self.set(namespace, query, encoded, ttl, params),
            Err(e) => {
                debug!(namespace, error = %e, "Value did not encode; not storing");
                false
            }
        }
    }

    /// Remove entries, counting each as an eviction.
    ///
    /// With `query` of `None` every entry in `namespace` goes; otherwise only
    /// the entry for `query` and `params`. Returns how many were removed.
    pub fn invalidate(&self, namespace: &str, query: Option<&str>, params: &CacheParams) -> usize {
        let mut inner = self.inner.lock();

        let removed = match query {
            None => {
                let before = inner.entries.len();
                inner.entries.retain(|key, _| key.namespace() != namespace);
                before - inner.entries.len()
            }
            Some(query) => match CacheKey::new(namespace, query, params) {
                Ok(key) => usize::from(inner.entries.remove(&key).is_some()),
                Err(e) => {
                    debug!(namespace, error = %e, "Cache key derivation failed");
                    0
                }
            },
        };

        inner.evictions += removed as u64;
        info!(namespace, removed, "Invalidated cache entries");
        removed
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().purge_expired(Instant::now())
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let cleared = inner.entries.len();
        *inner = CacheInner::default();
        info!(cleared, "Cleared response cache");
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total_requests = inner.hits + inner.misses;
        let hit_rate = if total_requests == 0 {
            0.0
        } else {
            inner.hits as f64 / total_requests as f64 * 100.0
        };

        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
            hit_rate_percent: (hit_rate * 100.0).round() / 100.0,
            total_requests,
            max_size: self.max_size,
            default_ttl_secs: self.default_ttl.as_secs(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn preview(query: &str) -> &str {
    match query.char_indices().nth(50) {
        Some((idx, _)) => &query[..idx],
        None => query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn small_cache(max_size: usize) -> ResponseCache {
        ResponseCache::new(CacheConfig {
            max_size,
            default_ttl: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_set_then_get() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        assert!(cache.set("wikipedia", "rust", json!({"title": "Rust"}), None, &params));
        assert_eq!(
            cache.get("wikipedia", "rust", &params),
            Some(json!({"title": "Rust"}))
        );

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hit_rate_percent, 100.0);
    }

    #[test]
    fn test_null_is_refused() {
        let cache = small_cache(10);
        assert!(!cache.set("tavily", "q", Value::Null, None, &CacheParams::new()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_one_entry() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        cache.set("tavily", "q", json!(1), None, &params);
        cache.set("tavily", "q", json!(2), None, &params);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("tavily", "q", &params), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_miss_and_eviction() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        cache.set("tavily", "q", json!("fresh"), Some(Duration::from_secs(5)), &params);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.get("tavily", "q", &params), Some(json!("fresh")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("tavily", "q", &params), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_uses_default() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        cache.set("tavily", "q", json!(1), Some(Duration::ZERO), &params);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get("tavily", "q", &params), Some(json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pressure_evicts_least_recently_accessed() {
        let cache = small_cache(5);
        let params = CacheParams::new();
        for i in 0..5 {
            cache.set("wikipedia", &format!("q{i}"), json!(i), None, &params);
            tokio::time::advance(Duration::from_millis(10)).await;
        }

        // Touch the oldest so q1 becomes the least recent.
        assert!(cache.get("wikipedia", "q0", &params).is_some());
        tokio::time::advance(Duration::from_millis(10)).await;

        cache.set("wikipedia", "q5", json!(5), None, &params);

        assert_eq!(cache.len(), 5);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache.get("wikipedia", "q0", &params).is_some());
        assert!(cache.get("wikipedia", "q1", &params).is_none());
        assert!(cache.get("wikipedia", "q5", &params).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purges_expired_first() {
        let cache = small_cache(2);
        let params = CacheParams::new();
        cache.set("tavily", "a", json!(1), Some(Duration::from_secs(1)), &params);
        cache.set("tavily", "b", json!(2), Some(Duration::from_secs(100)), &params);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.set("tavily", "c", json!(3), None, &params);

        // "a" expired and made room, so "b" survives.
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("tavily", "b", &params), Some(json!(2)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_invalidate_namespace_and_single_key() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        cache.set("wikipedia", "a", json!(1), None, &params);
        cache.set("wikipedia", "b", json!(2), None, &params);
        cache.set("wiki", "a", json!(3), None, &params);
        cache.set("tavily", "a", json!(4), None, &params);

        assert_eq!(cache.invalidate("tavily", Some("a"), &params), 1);
        assert_eq!(cache.invalidate("tavily", Some("a"), &params), 0);
        assert_eq!(cache.invalidate("wikipedia", None, &params), 2);

        // Exact namespace match: "wiki" is untouched.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("wiki", "a", &params), Some(json!(3)));
        assert_eq!(cache.stats().evictions, 3);
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        cache.set("tavily", "a", json!(1), None, &params);
        cache.get("tavily", "a", &params);
        cache.get("tavily", "missing", &params);

        cache.clear();

        let stats = cache.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate_percent, 0.0);
    }

    #[test]
    fn test_hit_rate_rounding() {
        let cache = small_cache(10);
        let params = CacheParams::new();
        cache.set("tavily", "a", json!(1), None, &params);
        cache.get("tavily", "a", &params);
        cache.get("tavily", "a", &params);
        cache.get("tavily", "b", &params);

        let stats = cache.stats();
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hit_rate_percent, 66.67);
    }

    #[test]
    fn test_typed_helpers() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Article {
            title: String,
            words: u32,
        }

        let cache = small_cache(10);
        let params = CacheParams::new();
        let article = Article {
            title: "Ferris".into(),
            words: 120,
        };
        assert!(cache.set_json("wikipedia", "ferris", &article, None, &params));
        assert_eq!(
            cache.get_json::<Article>("wikipedia", "ferris", &params),
            Some(article)
        );
        assert_eq!(cache.get_json::<Vec<u8>>("wikipedia", "ferris", &params), None);
        assert!(!cache.set_json("wikipedia", "nothing", &Option::<u32>::None, None, &params));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let long = "é".repeat(80);
        assert_eq!(preview(&long).chars().count(), 50);
        assert_eq!(preview("short"), "short");
    }
}
