//! Port Interfaces
//!
//! Contracts for the external collaborators the relay depends on,
//! following the hexagonal pattern: the core talks to these traits and
//! infrastructure supplies the adapters.
//!
//! The only port today is the `Authenticator`: the sole source of the
//! bearer token that authorizes an upstream feed connection. Token
//! issuance and refresh policy are entirely the collaborator's concern;
//! the relay asks for a fresh token before each connection attempt and
//! the token never outlives the connection it authorizes.

use async_trait::async_trait;

use crate::infrastructure::feed::auth::{AccessToken, AuthError, Credentials};

/// External authentication collaborator.
///
/// `login` is a stateless exchange: credentials in, bearer token out.
/// Failures are surfaced to the caller and must not be retried
/// automatically.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when the credentials are rejected or the token
    /// cannot be issued.
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, AuthError>;
}
