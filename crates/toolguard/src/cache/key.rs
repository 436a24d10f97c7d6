//! Cache key derivation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Extra parameters that change a tool's result (result count, language, ...).
///
/// Backed by a sorted map, so insertion order never affects the key.
///
/// ```rust
/// use toolguard::cache::CacheParams;
///
/// let a = CacheParams::new().with("max_results", 5).with("lang", "en");
/// let b = CacheParams::new().with("lang", "en").with("max_results", 5);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheParams(BTreeMap<String, Value>);

impl CacheParams {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for CacheParams {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CacheParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Identity of a cached response.
///
/// The digest is the hex SHA-256 of `namespace:query:params`, where params
/// is the JSON of the sorted parameter map. It is stable across processes.
/// The namespace is kept in the clear so a whole namespace can be dropped
/// at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    namespace: String,
    digest: String,
}

impl CacheKey {
    /// Derive the key for a lookup.
    pub fn new(namespace: &str, query: &str, params: &CacheParams) -> crate::Result<Self> {
        let params_json = serde_json::to_string(params)?;

        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update(b":");
        hasher.update(query.as_bytes());
        hasher.update(b":");
        hasher.update(params_json.as_bytes());

        Ok(Self {
            namespace: namespace.to_string(),
            digest: hex::encode(hasher.finalize()),
        })
    }

    /// The namespace component.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The hex digest component.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.digest)
    }
}
