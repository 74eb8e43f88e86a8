//! Error taxonomy surfaced to callers of the resilient client.
//!
//! Classification happens exactly once, at the point the raw failure is
//! observed (typically the HTTP boundary, via [`ApiError::from_status`]).
//! Everything above that boundary treats errors as opaque, already-classified
//! values: the retry executor pattern-matches on [`ErrorClassification`]
//! instead of inspecting transport details, and nothing is silently
//! downgraded (a 404 is never retried, never cached as a success).

use std::time::Duration;

use thiserror::Error;

/// Result alias for operations in this crate.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors produced by the resilient client and its collaborators.
///
/// The retryable/fatal split follows the policy used across all Relay
/// integrations: transport failures, 5xx and upstream 429 are retryable;
/// every other 4xx is fatal because retrying cannot succeed without an
/// external state change.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credential rejected at login. Never retried automatically.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A business call's token was rejected mid-session (HTTP 401).
    ///
    /// The session has been invalidated as a side effect; the caller must
    /// re-invoke, which performs a fresh login.
    #[error("authentication expired; session invalidated, re-invoke to log in again")]
    AuthenticationExpired,

    /// Authorization failure unrelated to token validity (HTTP 403).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Requested resource does not exist upstream (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other fatal client-side rejection (e.g. HTTP 400).
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider-supplied detail, if any.
        message: String,
    },

    /// This client's own limiter denied the call before any network request.
    #[error("local rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceededLocal {
        /// How long until the oldest recorded call leaves the window.
        retry_after: Duration,
    },

    /// The provider returned HTTP 429. Retried with backoff.
    #[error("upstream rate limit exceeded (HTTP 429)")]
    RateLimitExceededUpstream {
        /// Provider-supplied `Retry-After` hint, if present.
        retry_after: Option<Duration>,
    },

    /// Connection-level failure (DNS, refused, reset, timeout).
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// Provider-side failure (HTTP 5xx). Retried with backoff.
    #[error("server error (HTTP {status})")]
    ServerError {
        /// HTTP status returned by the provider.
        status: u16,
    },

    /// Terminal report after the retry budget is spent.
    ///
    /// Distinguishable from a single raw failure so callers can alert
    /// differently; the last observed error is preserved as the source.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The last error observed before giving up.
        #[source]
        source: Box<ApiError>,
    },

    /// The calling context was cancelled while a retry delay was pending.
    #[error("operation cancelled")]
    Cancelled,

    /// A component was constructed with invalid settings.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ApiError {
    /// Classify an HTTP status from a business call.
    ///
    /// `message` carries whatever detail the provider returned; it is kept
    /// only on fatal variants where callers need it for reporting.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => Self::AuthenticationExpired,
            403 => Self::AccessDenied(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimitExceededUpstream { retry_after: None },
            500..=599 => Self::ServerError { status },
            _ => Self::Rejected { status, message: message.into() },
        }
    }

    /// Classify an HTTP status observed during login.
    ///
    /// Identical to [`from_status`](Self::from_status) except that a 401/403
    /// means the credential itself was rejected, which is fatal and must not
    /// be confused with mid-session expiry.
    pub fn from_login_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(message.into()),
            _ => Self::from_status(status, message),
        }
    }

    /// True when this error is the mid-session 401 signal that must
    /// invalidate the cached session.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationExpired)
    }
}

/// Standard interface for classifying errors by retryability.
///
/// Implemented by [`ApiError`] and by any integration-specific error type
/// that wants to drive the retry executor.
pub trait ErrorClassification {
    /// Can the operation that produced this error succeed on retry?
    fn is_retryable(&self) -> bool;

    /// Suggested delay before the next attempt, when the provider supplied
    /// one. Overrides the computed backoff delay.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::TransientNetwork(_)
            | Self::ServerError { .. }
            | Self::RateLimitExceededUpstream { .. } => true,
            Self::AuthenticationFailed(_)
            | Self::AuthenticationExpired
            | Self::AccessDenied(_)
            | Self::NotFound(_)
            | Self::Rejected { .. }
            | Self::RateLimitExceededLocal { .. }
            | Self::RetriesExhausted { .. }
            | Self::Cancelled
            | Self::InvalidConfiguration(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceededUpstream { retry_after } => *retry_after,
            Self::RateLimitExceededLocal { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the error taxonomy and classification.
    use super::*;

    #[test]
    fn test_from_status_fatal_codes() {
        assert!(matches!(ApiError::from_status(401, ""), ApiError::AuthenticationExpired));
        assert!(matches!(ApiError::from_status(403, "scope"), ApiError::AccessDenied(_)));
        assert!(matches!(ApiError::from_status(404, "gone"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(400, "bad"), ApiError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_from_status_retryable_codes() {
        assert!(matches!(
            ApiError::from_status(429, ""),
            ApiError::RateLimitExceededUpstream { .. }
        ));
        assert!(matches!(ApiError::from_status(500, ""), ApiError::ServerError { status: 500 }));
        assert!(matches!(ApiError::from_status(503, ""), ApiError::ServerError { status: 503 }));
    }

    #[test]
    fn test_login_status_maps_rejection_to_authentication_failed() {
        assert!(matches!(
            ApiError::from_login_status(401, "bad credentials"),
            ApiError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            ApiError::from_login_status(403, "disabled"),
            ApiError::AuthenticationFailed(_)
        ));
        // Non-auth statuses keep the business-call classification
        assert!(matches!(
            ApiError::from_login_status(503, ""),
            ApiError::ServerError { status: 503 }
        ));
    }

    #[test]
    fn test_retryability_split() {
        assert!(ApiError::TransientNetwork("reset".into()).is_retryable());
        assert!(ApiError::ServerError { status: 502 }.is_retryable());
        assert!(ApiError::RateLimitExceededUpstream { retry_after: None }.is_retryable());

        assert!(!ApiError::AuthenticationFailed("nope".into()).is_retryable());
        assert!(!ApiError::AuthenticationExpired.is_retryable());
        assert!(!ApiError::NotFound("x".into()).is_retryable());
        assert!(!ApiError::Rejected { status: 400, message: String::new() }.is_retryable());
        assert!(!ApiError::Cancelled.is_retryable());
    }

    #[test]
    fn test_retry_after_hint() {
        let err = ApiError::RateLimitExceededUpstream {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(ApiError::ServerError { status: 500 }.retry_after(), None);
    }

    #[test]
    fn test_retries_exhausted_preserves_source() {
        let err = ApiError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ApiError::ServerError { status: 500 }),
        };
        assert!(err.to_string().contains("4 attempts"));
        assert!(!err.is_retryable());
        match err {
            ApiError::RetriesExhausted { source, .. } => {
                assert!(matches!(*source, ApiError::ServerError { status: 500 }));
            }
            _ => unreachable!(),
        }
    }
}
