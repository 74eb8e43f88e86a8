//! Sliding-window rate limiter for bounding outbound call rates.
//!
//! Counts calls within the trailing fixed-length interval ending "now", as
//! opposed to fixed calendar buckets. The limiter never sleeps or blocks;
//! the caller decides the denial policy (fail fast vs. wait and re-invoke).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use super::{Clock, SystemClock};
use crate::error::ApiError;

/// Configuration for the sliding-window rate limiter
#[derive(Debug, Clone)]
pub struct SlidingWindowConfig {
    /// Maximum number of calls granted per rolling window
    pub max_calls: u32,
    /// Length of the rolling window
    pub window: Duration,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        // Matches the strictest provider quota Relay fronts (30 calls/min)
        Self { max_calls: 30, window: Duration::from_secs(60) }
    }
}

impl SlidingWindowConfig {
    /// Create a new configuration builder
    pub fn builder() -> SlidingWindowConfigBuilder {
        SlidingWindowConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.max_calls == 0 {
            return Err(ApiError::InvalidConfiguration(
                "max_calls must be greater than 0".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(ApiError::InvalidConfiguration(
                "window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for SlidingWindowConfig
#[derive(Debug)]
pub struct SlidingWindowConfigBuilder {
    config: SlidingWindowConfig,
}

impl Default for SlidingWindowConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingWindowConfigBuilder {
    pub fn new() -> Self {
        Self { config: SlidingWindowConfig::default() }
    }

    pub fn max_calls(mut self, max_calls: u32) -> Self {
        self.config.max_calls = max_calls;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn build(self) -> Result<SlidingWindowConfig, ApiError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Outcome of a [`SlidingWindowLimiter::try_acquire`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// The call was permitted and recorded.
    Granted,
    /// The window is full; `retry_after` is how long until the oldest
    /// recorded call slides out of the window.
    Denied {
        /// Time until a permit frees up.
        retry_after: Duration,
    },
}

impl Acquire {
    /// True when the call was permitted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Sliding-window rate limiter
///
/// Maintains an append-only, time-pruned list of grant timestamps. Entries
/// are never mutated, only appended on grant and dropped once older than the
/// window. `Clone` shares the underlying state, so cloning a limiter into
/// several clients makes them share one provider-wide quota.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use relay_client::resilience::{SlidingWindowConfig, SlidingWindowLimiter};
///
/// # fn example() -> Result<(), relay_client::ApiError> {
/// let config = SlidingWindowConfig::builder()
///     .max_calls(30)
///     .window(Duration::from_secs(60))
///     .build()?;
/// let limiter = SlidingWindowLimiter::new(config);
///
/// if limiter.try_acquire().is_granted() {
///     // perform the call
/// }
/// # Ok(())
/// # }
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    config: SlidingWindowConfig,
    timestamps: Arc<Mutex<VecDeque<std::time::Instant>>>,
    clock: Arc<C>,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a new limiter with the system clock
    pub fn new(config: SlidingWindowConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a new limiter with a custom clock (useful for testing)
    pub fn with_clock(config: SlidingWindowConfig, clock: C) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::with_capacity(config.max_calls as usize))),
            config,
            clock: Arc::new(clock),
        }
    }

    /// Try to acquire a permit for one call.
    ///
    /// Prunes timestamps older than `now - window`, then grants and records
    /// `now` if the remaining count is below the limit. Synchronous and
    /// immediate; never sleeps.
    pub fn try_acquire(&self) -> Acquire {
        let now = self.clock.now();

        let mut timestamps = match self.timestamps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("rate limiter timestamp lock poisoned");
                poisoned.into_inner()
            }
        };

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.config.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if (timestamps.len() as u32) < self.config.max_calls {
            timestamps.push_back(now);
            debug!(
                used = timestamps.len(),
                max = self.config.max_calls,
                "rate limit permit granted"
            );
            return Acquire::Granted;
        }

        // Window is full: the next permit frees when the oldest entry ages out
        let retry_after = timestamps
            .front()
            .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or_default();

        warn!(?retry_after, max = self.config.max_calls, "rate limit window exhausted");
        Acquire::Denied { retry_after }
    }

    /// Number of permits still available in the current window.
    pub fn available_permits(&self) -> u32 {
        let now = self.clock.now();
        let mut timestamps = match self.timestamps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.config.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        self.config.max_calls.saturating_sub(timestamps.len() as u32)
    }

    /// Forget all recorded calls, restoring the full quota.
    pub fn reset(&self) {
        if let Ok(mut timestamps) = self.timestamps.lock() {
            timestamps.clear();
        }
    }
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            timestamps: Arc::clone(&self.timestamps),
            clock: Arc::clone(&self.clock),
        }
    }
}
