//! Resilience patterns for fault-tolerant remote calls.
//!
//! This module provides the generic, reusable pieces the client composes:
//! - **Sliding-window rate limiting**: bound calls to N per rolling window
//! - **Retry logic**: error-classifying retries with exponential backoff
//! - **Clock abstraction**: injected time source for deterministic tests
//!
//! The implementations are generic over error types and framework-agnostic;
//! domain knowledge (which HTTP status is retryable, what a session looks
//! like) lives in [`crate::error`] and [`crate::auth`].

pub mod clock;
pub mod rate_limiter;
pub mod retry;

// Re-export clock types
pub use clock::{Clock, MockClock, SystemClock};
// Re-export rate limiter types
pub use rate_limiter::{
    Acquire, SlidingWindowConfig, SlidingWindowConfigBuilder, SlidingWindowLimiter,
};
// Re-export retry types
pub use retry::{RetryConfig, RetryConfigBuilder, RetryError, RetryExecutor};
