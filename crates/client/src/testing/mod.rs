//! Mock collaborators for unit and integration tests.
//!
//! These stand in for the injected external calls ([`Transport`] and
//! [`Authenticator`]) so resilience behavior can be exercised without a
//! network: scripted failures, counted logins, controllable session TTLs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{Authenticator, Credential, Session};
use crate::client::Transport;
use crate::error::{ApiError, ApiResult};

/// One scripted outcome for a [`MockTransport`] call.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Succeed with this value.
    Ok(Value),
    /// Fail with the classification of this HTTP status.
    Status(u16),
    /// Fail with a transient network error.
    Transient,
}

impl ScriptedResponse {
    fn into_result(self) -> ApiResult<Value> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::Status(status) => Err(ApiError::from_status(status, "scripted failure")),
            Self::Transient => Err(ApiError::TransientNetwork("scripted failure".to_string())),
        }
    }
}

/// Record of one business call observed by a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Bearer token the client presented.
    pub token: String,
    /// Operation name.
    pub operation: String,
}

enum TransportMode {
    Always(Value),
    Scripted(Mutex<std::collections::VecDeque<ScriptedResponse>>),
}

/// Transport double with scripted outcomes and call recording.
pub struct MockTransport {
    mode: TransportMode,
    calls: Arc<AtomicU32>,
    recorded: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    /// Succeed every call with a clone of `value`.
    pub fn always(value: Value) -> Self {
        Self {
            mode: TransportMode::Always(value),
            calls: Arc::new(AtomicU32::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Play back `script` one entry per call; further calls fail.
    pub fn scripted(script: Vec<ScriptedResponse>) -> Self {
        Self {
            mode: TransportMode::Scripted(Mutex::new(script.into())),
            calls: Arc::new(AtomicU32::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail `failures` times with `status`, then succeed once with `value`.
    pub fn failing_then_ok(failures: u32, status: u16, value: Value) -> Self {
        let mut script: Vec<ScriptedResponse> =
            (0..failures).map(|_| ScriptedResponse::Status(status)).collect();
        script.push(ScriptedResponse::Ok(value));
        Self::scripted(script)
    }

    /// Shared handle to the number of calls that reached this transport.
    pub fn call_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    /// Shared handle to the recorded calls (token + operation per call).
    pub fn recorded_calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.recorded)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(
        &self,
        token: &str,
        operation: &str,
        _params: &BTreeMap<String, Value>,
    ) -> ApiResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded
                .push(RecordedCall { token: token.to_string(), operation: operation.to_string() });
        }

        match &self.mode {
            TransportMode::Always(value) => Ok(value.clone()),
            TransportMode::Scripted(script) => {
                let next = script.lock().ok().and_then(|mut s| s.pop_front());
                match next {
                    Some(response) => response.into_result(),
                    None => Err(ApiError::Rejected {
                        status: 0,
                        message: "mock transport script exhausted".to_string(),
                    }),
                }
            }
        }
    }
}

/// Authenticator double with counted logins and scripted failures.
///
/// Each successful login issues a fresh token (`token-1`, `token-2`, …) so
/// tests can tell sessions apart.
pub struct MockAuthenticator {
    session_ttl: Duration,
    reject_credential: bool,
    transient_failures: Arc<AtomicU32>,
    login_latency: Duration,
    logins: Arc<AtomicU32>,
}

impl MockAuthenticator {
    /// Authenticator that always succeeds, issuing sessions with `ttl`.
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            session_ttl,
            reject_credential: false,
            transient_failures: Arc::new(AtomicU32::new(0)),
            login_latency: Duration::ZERO,
            logins: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Authenticator that rejects the credential on every attempt.
    pub fn rejecting() -> Self {
        Self { reject_credential: true, ..Self::new(Duration::ZERO) }
    }

    /// Fail the first `count` logins with a transient network error.
    pub fn failing_first(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Delay each login, so concurrent callers overlap deterministically.
    pub fn with_login_latency(mut self, latency: Duration) -> Self {
        self.login_latency = latency;
        self
    }

    /// Shared handle to the number of login attempts made.
    pub fn login_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.logins)
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn login(&self, _credential: &Credential) -> Result<Session, ApiError> {
        if !self.login_latency.is_zero() {
            tokio::time::sleep(self.login_latency).await;
        }

        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;

        if self.reject_credential {
            return Err(ApiError::AuthenticationFailed("credential rejected".to_string()));
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::TransientNetwork("login endpoint unreachable".to_string()));
        }

        Ok(Session::new(format!("token-{attempt}"), self.session_ttl))
    }
}
