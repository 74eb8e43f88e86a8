//! Session and credential lifecycle.
//!
//! The manager owns the one session a client is allowed to hold, logs in
//! lazily through the injected [`Authenticator`], and recovers from
//! server-signaled expiry via [`SessionManager::invalidate`].

pub mod session;
pub mod traits;
pub mod types;

pub use session::SessionManager;
pub use traits::Authenticator;
pub use types::{Credential, Session};
