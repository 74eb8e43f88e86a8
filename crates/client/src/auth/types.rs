//! Credential and session types.

use std::fmt;
use std::time::{Duration, Instant};

/// Opaque identity used to authenticate against a provider.
///
/// Immutable and supplied at construction; some providers (e.g. public
/// registries) require none at all.
#[derive(Clone)]
pub enum Credential {
    /// No authentication required.
    None,
    /// Username/password pair exchanged for a session token at login.
    Basic {
        /// Account identifier.
        username: String,
        /// Account secret; redacted from `Debug` output.
        password: String,
    },
}

impl Credential {
    /// Convenience constructor for username/password credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "Credential::None"),
            Self::Basic { username, .. } => f
                .debug_struct("Credential::Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// A provider session obtained from a successful login.
///
/// Owned exclusively by the [`SessionManager`](super::SessionManager); the
/// token is handed out by value, the session itself never is.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// When the session was obtained.
    ///
    /// Provisional until the manager stores the session: validity is judged
    /// against the manager's injected clock, so the manager re-stamps this
    /// field from that clock on store.
    pub obtained_at: Instant,
    /// How long the provider considers the token valid.
    pub ttl: Duration,
}

impl Session {
    /// Create a session obtained now.
    pub fn new(token: impl Into<String>, ttl: Duration) -> Self {
        Self { token: token.into(), obtained_at: Instant::now(), ttl }
    }

    /// Derived validity: `now < obtained_at + ttl`.
    pub fn is_valid(&self, now: Instant) -> bool {
        now.duration_since(self.obtained_at) < self.ttl
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::types.
    use super::*;

    #[test]
    fn test_session_validity_window() {
        let obtained = Instant::now();
        let session =
            Session { token: "tok".to_string(), obtained_at: obtained, ttl: Duration::from_secs(60) };

        assert!(session.is_valid(obtained));
        assert!(session.is_valid(obtained + Duration::from_secs(59)));
        assert!(!session.is_valid(obtained + Duration::from_secs(60)));
        assert!(!session.is_valid(obtained + Duration::from_secs(120)));
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let credential = Credential::basic("alice", "hunter2");
        let rendered = format!("{credential:?}");

        assert!(rendered.contains("alice"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("hunter2"));
    }
}
