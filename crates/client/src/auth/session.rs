//! Session lifecycle manager.
//!
//! Owns a credential, authenticates lazily, caches the resulting session and
//! recovers from server-signaled expiry. State machine:
//!
//! `Unauthenticated → Authenticating → Authenticated → (Expired |
//! Invalidated) → Authenticating → …`

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::traits::Authenticator;
use super::types::{Credential, Session};
use crate::error::ApiError;
use crate::resilience::{Clock, RetryConfig, RetryExecutor, SystemClock};

/// Session manager with lazy login and single-flight coalescing.
///
/// At most one session is considered valid at a time. The session slot is an
/// async mutex held across the login await, so concurrent callers that all
/// observe "no valid token" wait for the one in-flight login instead of each
/// issuing their own; whoever acquires the lock next re-checks validity
/// before logging in again.
///
/// Transient login failures (unreachable endpoint, 5xx) are retried through
/// the manager's own [`RetryExecutor`]; a rejected credential surfaces as
/// [`ApiError::AuthenticationFailed`] and is never retried.
pub struct SessionManager<A: Authenticator, C: Clock = SystemClock> {
    authenticator: Arc<A>,
    credential: Credential,
    session: Arc<Mutex<Option<Session>>>,
    retry: RetryExecutor,
    clock: Arc<C>,
}

impl<A: Authenticator> SessionManager<A, SystemClock> {
    /// Create a session manager with the system clock.
    pub fn new(authenticator: A, credential: Credential, retry: RetryConfig) -> Self {
        Self::with_clock(authenticator, credential, retry, SystemClock)
    }
}

impl<A: Authenticator, C: Clock> SessionManager<A, C> {
    /// Create a session manager with a custom clock (useful for testing).
    pub fn with_clock(
        authenticator: A,
        credential: Credential,
        retry: RetryConfig,
        clock: C,
    ) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            credential,
            session: Arc::new(Mutex::new(None)),
            retry: RetryExecutor::new(retry),
            clock: Arc::new(clock),
        }
    }

    /// Return a valid token, logging in first if none is cached.
    ///
    /// A cached, unexpired session is returned with no I/O. Otherwise the
    /// injected login call runs (through the retry executor) and the new
    /// session is stored before its token is returned.
    pub async fn get_valid_token(&self) -> Result<String, ApiError> {
        // Holding the lock across the login await coalesces concurrent
        // callers onto a single in-flight login.
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.is_valid(self.clock.now()) {
                debug!("reusing cached session token");
                return Ok(session.token.clone());
            }
            debug!("cached session expired, re-authenticating");
            *slot = None;
        }

        let authenticator = Arc::clone(&self.authenticator);
        let credential = self.credential.clone();

        let mut session = self
            .retry
            .execute(move || {
                let authenticator = Arc::clone(&authenticator);
                let credential = credential.clone();
                async move { authenticator.login(&credential).await }
            })
            .await
            .map_err(ApiError::from)?;

        // Validity is judged against this manager's clock, so the session is
        // stamped from it; the authenticator's own stamp is provisional.
        session.obtained_at = self.clock.now();

        info!("login succeeded, session cached");
        let token = session.token.clone();
        *slot = Some(session);
        Ok(token)
    }

    /// Force-clear the session so the next call re-authenticates.
    ///
    /// Used when a downstream call reports the token as rejected.
    pub async fn invalidate(&self) {
        let mut slot = self.session.lock().await;
        if slot.take().is_some() {
            warn!("session invalidated");
        }
    }

    /// True when a session exists and is still within its TTL.
    pub async fn has_valid_session(&self) -> bool {
        let slot = self.session.lock().await;
        slot.as_ref().is_some_and(|s| s.is_valid(self.clock.now()))
    }
}
