//! The unit of work passed into the resilient client.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

/// Caching instructions attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Whether a successful response may be served from / stored in cache.
    pub enabled: bool,
    /// How long a stored response stays fresh.
    pub ttl: Duration,
}

impl CachePolicy {
    /// Do not cache (the default).
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Cache successful responses for `ttl`.
    pub fn enabled(ttl: Duration) -> Self {
        Self { enabled: true, ttl }
    }
}

/// A named remote operation with parameters and cache policy.
///
/// Parameters live in a `BTreeMap` so identical (name, params) pairs
/// serialize to the identical cache key regardless of insertion order.
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use relay_client::client::OperationRequest;
///
/// let request = OperationRequest::new("getCompany")
///     .param("siren", "123456789")
///     .cache_for(Duration::from_secs(300));
/// ```
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Operation name, resolved by the transport.
    pub name: String,
    /// Operation parameters, keyed deterministically.
    pub params: BTreeMap<String, Value>,
    /// Cache policy for this request.
    pub cache_policy: CachePolicy,
}

impl OperationRequest {
    /// Create a request for the named operation with no parameters and
    /// caching disabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), params: BTreeMap::new(), cache_policy: CachePolicy::disabled() }
    }

    /// Add a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Enable caching of successful responses for `ttl`.
    pub fn cache_for(mut self, ttl: Duration) -> Self {
        self.cache_policy = CachePolicy::enabled(ttl);
        self
    }

    /// Deterministic cache key: operation name plus the canonical JSON of
    /// the sorted parameter map.
    pub fn cache_key(&self) -> String {
        // BTreeMap serializes in key order, so the key is insertion-order
        // independent; Value-to-JSON itself cannot fail.
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        format!("{}:{params}", self.name)
    }
}
