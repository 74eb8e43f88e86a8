//! Retry executor with error classification and exponential backoff.
//!
//! The executor runs an operation, asks the error itself whether it is
//! retryable (via [`ErrorClassification`]), and either retries with pure
//! exponential backoff or propagates immediately. Fatal errors never consume
//! retry budget; exhausting the budget is itself a distinct, reported
//! failure, never silently swallowed.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{ApiError, ErrorClassification};

/// Errors produced by a retry execution.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The retry budget was spent; `source` is the last observed error.
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// Last error observed before giving up.
        source: E,
    },

    /// The operation failed with a non-retryable error on some attempt.
    #[error("operation failed with non-retryable error")]
    Fatal {
        /// The fatal error, returned on the attempt it occurred.
        source: E,
    },

    /// The calling context was cancelled while a backoff delay was pending.
    #[error("retry cancelled while waiting to re-attempt")]
    Cancelled,
}

impl From<RetryError<ApiError>> for ApiError {
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::Exhausted { attempts, source } => {
                ApiError::RetriesExhausted { attempts, source: Box::new(source) }
            }
            RetryError::Fatal { source } => source,
            RetryError::Cancelled => ApiError::Cancelled,
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.base_delay > self.max_delay {
            return Err(ApiError::InvalidConfiguration(
                "base_delay must not exceed max_delay".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for RetryConfig
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.config.base_delay = base_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.config.max_delay = max_delay;
        self
    }

    pub fn build(self) -> Result<RetryConfig, ApiError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The retry executor
///
/// Generic over the error type so login calls and business calls share one
/// implementation; the error carries its own classification.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use relay_client::resilience::{RetryConfig, RetryExecutor};
/// use relay_client::ApiError;
///
/// # async fn example() -> Result<(), ApiError> {
/// let config = RetryConfig::builder()
///     .max_retries(3)
///     .base_delay(Duration::from_millis(200))
///     .build()?;
/// let executor = RetryExecutor::new(config);
///
/// let value: u32 = executor
///     .execute(|| async { Ok::<_, ApiError>(42) })
///     .await
///     .map_err(ApiError::from)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancellation: Option<CancellationToken>,
}

impl RetryExecutor {
    /// Create a new retry executor with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config, cancellation: None }
    }

    /// Attach a cancellation token.
    ///
    /// A pending backoff delay races the token: on cancellation the executor
    /// aborts the wait and returns [`RetryError::Cancelled`] instead of
    /// continuing to retry.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Delay between attempt `attempt` and the next one: `base * 2^attempt`,
    /// capped at `max_delay` (attempt indices 0-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.config.base_delay.saturating_mul(factor).min(self.config.max_delay)
    }

    /// Execute an operation with retry logic.
    ///
    /// The first attempt runs immediately. A fatal error stops the loop at
    /// once regardless of remaining budget; a retryable error sleeps for the
    /// backoff delay (or the error's own `retry_after` hint, when present)
    /// and tries again, up to `max_retries` retries.
    #[instrument(skip(self, operation), fields(max_retries = self.config.max_retries))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: ErrorClassification + fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => {
                    debug!(?error, attempt, "non-retryable error, giving up");
                    return Err(RetryError::Fatal { source: error });
                }
                Err(error) => {
                    if attempt >= self.config.max_retries {
                        warn!(?error, attempts = attempt + 1, "retry budget exhausted");
                        return Err(RetryError::Exhausted { attempts: attempt + 1, source: error });
                    }

                    let delay = error.retry_after().unwrap_or_else(|| self.backoff_delay(attempt));
                    warn!(?error, attempt = attempt + 1, ?delay, "retryable failure, backing off");

                    if !self.sleep(delay).await {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Sleep for `delay`, racing the cancellation token when one is set.
    /// Returns false when the wait was aborted by cancellation.
    async fn sleep(&self, delay: Duration) -> bool {
        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => false,
                    () = tokio::time::sleep(delay) => true,
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for resilience::retry.
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    fn executor(max_retries: u32, base_delay: Duration) -> RetryExecutor {
        let config = RetryConfig::builder()
            .max_retries(max_retries)
            .base_delay(base_delay)
            .max_delay(Duration::from_secs(30))
            .build()
            .unwrap();
        RetryExecutor::new(config)
    }

    #[test]
    fn test_backoff_is_pure_exponential() {
        let executor = executor(5, Duration::from_millis(100));

        assert_eq!(executor.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(executor.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(executor.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(executor.backoff_delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_caps_at_max_delay() {
        let config = RetryConfig::builder()
            .max_retries(20)
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(5))
            .build()
            .unwrap();
        let executor = RetryExecutor::new(config);

        assert_eq!(executor.backoff_delay(10), Duration::from_secs(5));
        assert_eq!(executor.backoff_delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_config_validation() {
        let result = RetryConfig::builder()
            .base_delay(Duration::from_secs(60))
            .max_delay(Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = executor(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = executor
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ApiError>(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_causes_exactly_one_attempt() {
        let executor = executor(5, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = executor
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::NotFound("missing".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Fatal { source: ApiError::NotFound(_) })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_exhausts_budget() {
        let executor = executor(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = executor
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::ServerError { status: 502 })
                }
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, source }) => {
                assert_eq!(attempts, 4); // 1 initial + 3 retries
                assert!(matches!(source, ApiError::ServerError { status: 502 }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let executor = executor(3, Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = executor
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ApiError::TransientNetwork("reset".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_after_hint_overrides_backoff() {
        // A huge base delay would stall the test; the hint keeps it short.
        let executor = executor(1, Duration::from_secs(60));
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let started = Instant::now();

        let result = executor
            .execute(|| {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::RateLimitExceededUpstream {
                            retry_after: Some(Duration::from_millis(5)),
                        })
                    } else {
                        Ok(1)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_pending_backoff() {
        let token = CancellationToken::new();
        let executor = executor(3, Duration::from_secs(60)).with_cancellation(token.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let handle = tokio::spawn(async move {
            executor
                .execute(move || {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(ApiError::ServerError { status: 500 })
                    }
                })
                .await
        });

        // Let the first attempt fail and enter its backoff sleep
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_error_converts_to_api_error() {
        let err: ApiError = RetryError::Exhausted {
            attempts: 4,
            source: ApiError::ServerError { status: 500 },
        }
        .into();
        assert!(matches!(err, ApiError::RetriesExhausted { attempts: 4, .. }));

        let err: ApiError =
            RetryError::Fatal { source: ApiError::NotFound("x".into()) }.into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = RetryError::<ApiError>::Cancelled.into();
        assert!(matches!(err, ApiError::Cancelled));
    }
}
