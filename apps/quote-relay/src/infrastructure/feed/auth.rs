//! Feed Authentication
//!
//! Authentication against the upstream market data feed. The feed expects
//! an auth request as the first client message after the connection
//! greeting; connections that have not authenticated within a few seconds
//! are closed by the server.
//!
//! # Flow
//!
//! 1. Connect to the WebSocket endpoint
//! 2. Receive `{"t":"success","msg":"connected"}`
//! 3. Send `{"action":"auth","api_key":"...","client_code":"...","token":"..."}`
//! 4. Receive `{"t":"success","msg":"authenticated"}` or an error
//!
//! # Error Codes
//!
//! - 401: Not authenticated
//! - 402: Invalid credentials
//! - 403: Token expired
//! - 404: Authentication timeout
//! - 406: Connection limit exceeded
//!
//! Authentication failures are surfaced to the caller and never retried
//! automatically; only transport-level drops go through the reconnect
//! path.

use async_trait::async_trait;
use thiserror::Error;

use super::messages::{AuthRequest, ErrorMessage, SuccessKind, SuccessMessage};
use crate::application::ports::Authenticator;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during feed authentication.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Not authenticated (must authenticate before subscribing).
    #[error("not authenticated: must authenticate before making requests")]
    NotAuthenticated,

    /// Credentials were rejected.
    #[error("authentication failed: invalid credentials")]
    InvalidCredentials,

    /// The bearer token has expired and must be reissued externally.
    #[error("authentication failed: token expired")]
    TokenExpired,

    /// Authentication took too long.
    #[error("authentication timeout")]
    Timeout,

    /// Too many concurrent connections for this account.
    #[error("connection limit exceeded")]
    ConnectionLimitExceeded,

    /// Credentials or messages were malformed.
    #[error("invalid auth data: {0}")]
    Invalid(String),

    /// Unexpected error from the feed.
    #[error("feed error ({code}): {message}")]
    Upstream {
        /// Error code from the feed.
        code: i32,
        /// Error message from the feed.
        message: String,
    },
}

impl From<&ErrorMessage> for AuthError {
    fn from(err: &ErrorMessage) -> Self {
        match err.code {
            401 => Self::NotAuthenticated,
            402 => Self::InvalidCredentials,
            403 => Self::TokenExpired,
            404 => Self::Timeout,
            406 => Self::ConnectionLimitExceeded,
            code => Self::Upstream {
                code,
                message: err.msg.clone(),
            },
        }
    }
}

// =============================================================================
// Credentials and Tokens
// =============================================================================

/// Feed account credentials.
///
/// `Debug` and `Display` redact the PIN so the struct is safe to log.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    client_code: String,
    pin: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is empty.
    pub fn new(
        api_key: impl Into<String>,
        client_code: impl Into<String>,
        pin: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let api_key = api_key.into();
        let client_code = client_code.into();
        let pin = pin.into();

        if api_key.is_empty() {
            return Err(AuthError::Invalid("API key cannot be empty".to_string()));
        }
        if client_code.is_empty() {
            return Err(AuthError::Invalid(
                "client code cannot be empty".to_string(),
            ));
        }
        if pin.is_empty() {
            return Err(AuthError::Invalid("PIN cannot be empty".to_string()));
        }

        Ok(Self {
            api_key,
            client_code,
            pin,
        })
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the client code.
    #[must_use]
    pub fn client_code(&self) -> &str {
        &self.client_code
    }

    /// Get the PIN.
    #[must_use]
    pub fn pin(&self) -> &str {
        &self.pin
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("client_code", &self.client_code)
            .field("pin", &"[REDACTED]")
            .finish()
    }
}

/// Bearer token authorizing one upstream connection.
///
/// Borrowed from the external authenticator per connection attempt and
/// dropped with the connection; it is never stored beyond that.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap an issued token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for embedding in an auth request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

// =============================================================================
// Authentication State Machine
// =============================================================================

/// Current state of the per-connection authentication handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Not yet connected.
    #[default]
    Disconnected,
    /// Connection greeting received, auth not yet sent.
    Greeted,
    /// Auth request sent, awaiting response.
    Authenticating,
    /// Successfully authenticated.
    Authenticated,
    /// Authentication failed.
    Failed,
}

impl AuthState {
    /// Check if currently authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// Drives the auth handshake for one feed connection.
///
/// Consumes the greeting and auth responses, tracks state, and builds the
/// auth request from the credentials and the per-connection token.
#[derive(Debug)]
pub struct AuthHandler {
    credentials: Credentials,
    token: AccessToken,
    state: AuthState,
}

impl AuthHandler {
    /// Create a handler for a new connection.
    #[must_use]
    pub const fn new(credentials: Credentials, token: AccessToken) -> Self {
        Self {
            credentials,
            token,
            state: AuthState::Disconnected,
        }
    }

    /// Current handshake state.
    #[must_use]
    pub const fn state(&self) -> AuthState {
        self.state
    }

    /// Check if the handshake has completed.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    /// Build the auth request and move to `Authenticating`.
    #[must_use]
    pub fn create_auth_request(&mut self) -> AuthRequest {
        self.state = AuthState::Authenticating;
        AuthRequest::new(
            self.credentials.api_key(),
            self.credentials.client_code(),
            self.token.expose(),
        )
    }

    /// Process a success message from the feed.
    ///
    /// Returns `true` once the handshake is complete; `false` means the
    /// greeting arrived and the auth request should be sent now.
    pub const fn on_success(&mut self, msg: &SuccessMessage) -> bool {
        match msg.msg {
            SuccessKind::Connected => {
                self.state = AuthState::Greeted;
                false
            }
            SuccessKind::Authenticated => {
                self.state = AuthState::Authenticated;
                true
            }
        }
    }

    /// Process an error message from the feed.
    pub fn on_error(&mut self, msg: &ErrorMessage) -> AuthError {
        self.state = AuthState::Failed;
        AuthError::from(msg)
    }
}

// =============================================================================
// Static Authenticator Adapter
// =============================================================================

/// Authenticator backed by an externally issued token.
///
/// Token issuance and refresh live entirely outside this service: the
/// operator provisions a current token via configuration and this adapter
/// hands it out after checking the presented credentials against the
/// configured account. Swapping in a real login client only requires
/// another `Authenticator` implementation.
pub struct StaticAuthenticator {
    expected: Credentials,
    token: String,
}

impl StaticAuthenticator {
    /// Create an authenticator for the configured account and token.
    #[must_use]
    pub const fn new(expected: Credentials, token: String) -> Self {
        Self { expected, token }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<AccessToken, AuthError> {
        if credentials.client_code() != self.expected.client_code()
            || credentials.pin() != self.expected.pin()
        {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(AccessToken::new(self.token.clone()))
    }
}

// =============================================================================
// Tests
// =============================================================================
