//! Configuration for the composed resilient client.

use crate::cache::CacheConfig;
use crate::error::ApiError;
use crate::resilience::{RetryConfig, SlidingWindowConfig};

/// Configuration for [`ResilientClient`](super::ResilientClient)
///
/// Bundles the per-component configs; each is validated on build. The same
/// retry policy governs login calls and business calls; the error
/// classification, not the policy, decides what is retried.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Sliding-window limit applied before any network call.
    pub rate_limit: SlidingWindowConfig,
    /// Retry policy for login and business calls.
    pub retry: RetryConfig,
    /// Bounds for the response cache.
    pub cache: CacheConfig,
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        self.rate_limit.validate()?;
        self.retry.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self { config: ClientConfig::default() }
    }

    pub fn rate_limit(mut self, rate_limit: SlidingWindowConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ApiError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client::config.
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_propagates_component_validation() {
        let bad_limit = SlidingWindowConfig { max_calls: 0, window: Duration::from_secs(60) };
        assert!(ClientConfig::builder().rate_limit(bad_limit).build().is_err());

        let bad_retry = RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(1),
        };
        assert!(ClientConfig::builder().retry(bad_retry).build().is_err());

        assert!(ClientConfig::builder().cache(CacheConfig::bounded(0)).build().is_err());
    }
}
