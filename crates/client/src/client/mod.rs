//! The composed resilient client, the only type integrations use directly.
//!
//! `invoke` threads one logical remote call through the cache, the session
//! manager, the rate limiter and the retry executor, in that order. The
//! collaborators are owned by the client; sharing a provider-wide quota
//! across clients means passing the same limiter clone to each builder.

pub mod config;
pub mod request;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

pub use config::{ClientConfig, ClientConfigBuilder};
pub use request::{CachePolicy, OperationRequest};

use crate::auth::{Authenticator, Credential, SessionManager};
use crate::cache::TtlCache;
use crate::error::{ApiError, ApiResult};
use crate::resilience::{
    Acquire, Clock, RetryExecutor, SlidingWindowLimiter, SystemClock,
};

/// Trait for the injected business call.
///
/// Implementations classify failures at the boundary: errors must already be
/// [`ApiError`] variants (e.g. via [`ApiError::from_status`]) so the retry
/// executor and the 401-invalidates-session rule can pattern-match instead
/// of inspecting transport details.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the named operation with the given bearer token.
    async fn call(
        &self,
        token: &str,
        operation: &str,
        params: &std::collections::BTreeMap<String, Value>,
    ) -> ApiResult<Value>;
}

/// Implement Transport for Arc<T> for convenient sharing
#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn call(
        &self,
        token: &str,
        operation: &str,
        params: &std::collections::BTreeMap<String, Value>,
    ) -> ApiResult<Value> {
        (**self).call(token, operation, params).await
    }
}

/// Resilient client for one upstream provider.
///
/// Composes a [`TtlCache`], a [`SessionManager`], a [`SlidingWindowLimiter`]
/// and a [`RetryExecutor`] around [`invoke`](Self::invoke). Each instance's
/// collaborators are independent unless a limiter is explicitly shared.
///
/// # Example
/// ```rust,no_run
/// use std::time::Duration;
///
/// use relay_client::auth::Credential;
/// use relay_client::client::{ClientBuilder, OperationRequest};
/// # use relay_client::testing::{MockAuthenticator, MockTransport};
///
/// # async fn example() -> Result<(), relay_client::ApiError> {
/// # let transport = MockTransport::always(serde_json::json!({}));
/// # let authenticator = MockAuthenticator::new(Duration::from_secs(3600));
/// let client = ClientBuilder::new(transport, authenticator)
///     .credential(Credential::basic("user", "secret"))
///     .build()?;
///
/// let request = OperationRequest::new("getCompany")
///     .param("siren", "123456789")
///     .cache_for(Duration::from_secs(300));
/// let company = client.invoke(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct ResilientClient<T: Transport, A: Authenticator, C: Clock = SystemClock> {
    transport: Arc<T>,
    session: SessionManager<A, C>,
    limiter: SlidingWindowLimiter<C>,
    cache: TtlCache<String, Value, C>,
    retry: RetryExecutor,
}

impl<T: Transport, A: Authenticator, C: Clock + Clone> ResilientClient<T, A, C> {
    /// Invoke a named remote operation.
    ///
    /// 1. On a cache hit the stored response is returned immediately, with
    ///    no rate-limit consumption and no network.
    /// 2. A valid token is obtained (logging in lazily if needed).
    /// 3. The limiter is consulted; on denial this fails fast with
    ///    [`ApiError::RateLimitExceededLocal`]. The client never sleeps on
    ///    the caller's behalf; callers decide whether to wait and re-invoke.
    /// 4. The business call runs through the retry executor. A mid-session
    ///    401 invalidates the session and surfaces
    ///    [`ApiError::AuthenticationExpired`]; re-invoking logs in fresh.
    /// 5. A cacheable success is stored with the requested TTL.
    #[instrument(skip(self, request), fields(operation = %request.name))]
    pub async fn invoke(&self, request: &OperationRequest) -> ApiResult<Value> {
        let cache_key = request.cache_key();

        if request.cache_policy.enabled {
            if let Some(value) = self.cache.get(&cache_key) {
                debug!("cache hit, skipping network");
                return Ok(value);
            }
        }

        let token = self.session.get_valid_token().await?;

        if let Acquire::Denied { retry_after } = self.limiter.try_acquire() {
            warn!(?retry_after, "local rate limit denied call");
            return Err(ApiError::RateLimitExceededLocal { retry_after });
        }

        let operation = {
            let transport = Arc::clone(&self.transport);
            let name = request.name.clone();
            let params = request.params.clone();
            move || {
                let transport = Arc::clone(&transport);
                let token = token.clone();
                let name = name.clone();
                let params = params.clone();
                async move { transport.call(&token, &name, &params).await }
            }
        };

        match self.retry.execute(operation).await {
            Ok(value) => {
                if request.cache_policy.enabled {
                    self.cache.insert(cache_key, value.clone(), request.cache_policy.ttl);
                }
                Ok(value)
            }
            Err(err) => {
                let err = ApiError::from(err);
                if err.is_auth_expired() {
                    // Next invoke re-authenticates; surfacing the error
                    // instead of looping internally keeps retries bounded.
                    self.session.invalidate().await;
                }
                Err(err)
            }
        }
    }

    /// Invoke and deserialize the response into `V`.
    ///
    /// Deserialization failures surface as [`ApiError::Rejected`] with the
    /// provider's payload intact in the message.
    pub async fn invoke_as<V: DeserializeOwned>(&self, request: &OperationRequest) -> ApiResult<V> {
        let value = self.invoke(request).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Rejected {
            status: 0,
            message: format!("response did not match expected shape: {e}"),
        })
    }

    /// Evict the cached response for one request (e.g. a force-refresh
    /// action).
    pub fn invalidate_cache(&self, request: &OperationRequest) {
        self.cache.remove(&request.cache_key());
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Manual logout: the next invoke performs a fresh login.
    pub async fn invalidate_session(&self) {
        self.session.invalidate().await;
    }

    /// The limiter backing this client, for sharing one provider-wide quota
    /// across several clients.
    pub fn limiter(&self) -> SlidingWindowLimiter<C> {
        self.limiter.clone()
    }
}

/// Builder for [`ResilientClient`]
pub struct ClientBuilder<T: Transport, A: Authenticator, C: Clock = SystemClock> {
    transport: T,
    authenticator: A,
    credential: Credential,
    config: ClientConfig,
    clock: C,
    limiter: Option<SlidingWindowLimiter<C>>,
    cancellation: Option<CancellationToken>,
}

impl<T: Transport, A: Authenticator> ClientBuilder<T, A, SystemClock> {
    /// Start building a client over the given transport and authenticator.
    pub fn new(transport: T, authenticator: A) -> Self {
        Self {
            transport,
            authenticator,
            credential: Credential::None,
            config: ClientConfig::default(),
            clock: SystemClock,
            limiter: None,
            cancellation: None,
        }
    }
}

impl<T: Transport, A: Authenticator, C: Clock + Clone> ClientBuilder<T, A, C> {
    /// Credential handed to the authenticator on login.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    /// Component configuration (validated at [`build`](Self::build)).
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing limiter instead of creating one, representing a
    /// provider-wide quota across several clients.
    ///
    /// Overrides the rate-limit section of the config.
    pub fn shared_limiter(mut self, limiter: SlidingWindowLimiter<C>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Cancellation token observed during retry backoff waits.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Swap in a custom clock (useful for testing).
    ///
    /// Resets any previously shared limiter, which is tied to the old clock.
    pub fn with_clock<C2: Clock + Clone>(self, clock: C2) -> ClientBuilder<T, A, C2> {
        ClientBuilder {
            transport: self.transport,
            authenticator: self.authenticator,
            credential: self.credential,
            config: self.config,
            clock,
            limiter: None,
            cancellation: self.cancellation,
        }
    }

    /// Validate the configuration and assemble the client.
    pub fn build(self) -> ApiResult<ResilientClient<T, A, C>> {
        self.config.validate()?;

        let mut retry = RetryExecutor::new(self.config.retry.clone());
        if let Some(token) = self.cancellation {
            retry = retry.with_cancellation(token);
        }

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => SlidingWindowLimiter::with_clock(
                self.config.rate_limit.clone(),
                self.clock.clone(),
            ),
        };

        Ok(ResilientClient {
            transport: Arc::new(self.transport),
            session: SessionManager::with_clock(
                self.authenticator,
                self.credential,
                self.config.retry.clone(),
                self.clock.clone(),
            ),
            limiter,
            cache: TtlCache::with_clock(self.config.cache.clone(), self.clock),
            retry,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client assembly; end-to-end scenarios live in
    //! tests/client_integration.rs.
    use std::time::Duration;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::resilience::SlidingWindowConfig;
    use crate::testing::{MockAuthenticator, MockTransport};

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = ClientConfig {
            rate_limit: SlidingWindowConfig { max_calls: 0, window: Duration::from_secs(60) },
            ..ClientConfig::default()
        };

        let result = ClientBuilder::new(
            MockTransport::always(serde_json::json!({})),
            MockAuthenticator::new(Duration::from_secs(60)),
        )
        .config(config)
        .build();

        assert!(matches!(result, Err(ApiError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_builder_accepts_defaults() {
        let result = ClientBuilder::new(
            MockTransport::always(serde_json::json!({})),
            MockAuthenticator::new(Duration::from_secs(60)),
        )
        .config(ClientConfig::builder().cache(CacheConfig::bounded(50)).build().unwrap())
        .build();

        assert!(result.is_ok());
    }
}
