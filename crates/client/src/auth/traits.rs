//! Trait for the injected login operation.
//!
//! Abstracting the login call enables testing with mock implementations and
//! keeps provider-specific request/response shapes out of the core.

use async_trait::async_trait;

use super::types::{Credential, Session};
use crate::error::ApiError;

/// Trait for authenticating a credential against a provider.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Perform the external login call.
    ///
    /// # Errors
    /// Returns [`ApiError::AuthenticationFailed`] when the credential is
    /// rejected (never retried), or a retryable transport/server error when
    /// the login endpoint itself is unreachable.
    async fn login(&self, credential: &Credential) -> Result<Session, ApiError>;
}

/// Implement Authenticator for Arc<T> for convenient sharing
#[async_trait]
impl<T: Authenticator + ?Sized> Authenticator for std::sync::Arc<T> {
    async fn login(&self, credential: &Credential) -> Result<Session, ApiError> {
        (**self).login(credential).await
    }
}
