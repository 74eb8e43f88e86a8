//! Resilient remote client building blocks shared by Relay integrations.
//!
//! Every external provider Relay talks to (registries, inference servers,
//! trading backends) sits behind the same small set of concerns: survive
//! flaky networks, respect provider rate limits, avoid redundant logins, and
//! avoid refetching data that rarely changes. This crate implements that
//! pattern once, generalized:
//!
//! - [`cache::TtlCache`]: expiring key/value store for idempotent reads
//! - [`resilience::SlidingWindowLimiter`]: N calls per rolling window
//! - [`resilience::RetryExecutor`]: classify-then-retry with exponential
//!   backoff
//! - [`auth::SessionManager`]: lazy login, cached session, expiry recovery
//! - [`client::ResilientClient`]: composes the four around a single
//!   `invoke` call, the only type integrations use directly
//!
//! Integrations inject their provider specifics through the
//! [`client::Transport`] and [`auth::Authenticator`] traits; a reference
//! HTTP implementation lives in [`transport`].

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod cache;
pub mod client;
pub mod error;
pub mod resilience;
pub mod testing;
pub mod transport;

// Re-export commonly used types for convenience
pub use auth::{Authenticator, Credential, Session, SessionManager};
pub use cache::{CacheConfig, TtlCache};
pub use client::{
    CachePolicy, ClientBuilder, ClientConfig, OperationRequest, ResilientClient, Transport,
};
pub use error::{ApiError, ApiResult, ErrorClassification};
pub use resilience::{
    Acquire, Clock, MockClock, RetryConfig, RetryError, RetryExecutor, SlidingWindowConfig,
    SlidingWindowLimiter, SystemClock,
};
