//! Feed Wire Messages
//!
//! Serde types for the upstream feed's JSON frames. Every server message
//! carries a `t` discriminator; client requests carry an `action`.
//!
//! # Server Messages
//!
//! ```json
//! {"t":"success","msg":"connected"}
//! {"t":"success","msg":"authenticated"}
//! {"t":"error","code":402,"msg":"invalid credentials"}
//! {"t":"subscription","tokens":["99926000","99926037"]}
//! {"t":"tick","token":"99926000","ltp":22510.5,"ts":"2026-08-07T09:15:00Z"}
//! ```
//!
//! # Client Requests
//!
//! ```json
//! {"action":"auth","api_key":"...","client_code":"...","token":"..."}
//! {"action":"subscribe","mode":"ltp","tokens":["99926000"]}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Server Messages
// =============================================================================

/// Success message: connection greeting or auth confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    /// Message type (always "success").
    #[serde(rename = "t")]
    pub msg_type: String,

    /// What succeeded: "connected" or "authenticated".
    pub msg: SuccessKind,
}

/// Kind of success message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessKind {
    /// Initial connection established.
    Connected,
    /// Authentication accepted.
    Authenticated,
}

/// Error message with code and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Message type (always "error").
    #[serde(rename = "t")]
    pub msg_type: String,

    /// Error code.
    pub code: i32,

    /// Error description.
    pub msg: String,
}

impl ErrorMessage {
    /// Check if this error belongs to the authentication handshake.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        matches!(self.code, 401..=404 | 406)
    }
}

/// Subscription acknowledgement listing the active tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMessage {
    /// Message type (always "subscription").
    #[serde(rename = "t")]
    pub msg_type: String,

    /// Tokens the connection is now subscribed to.
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// A single price tick for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickMessage {
    /// Message type (always "tick").
    #[serde(rename = "t")]
    pub msg_type: String,

    /// Instrument token the tick belongs to.
    pub token: String,

    /// Last traded price.
    pub ltp: Decimal,

    /// Exchange timestamp of the observation.
    pub ts: DateTime<Utc>,
}

/// Any message the feed can send, discriminated by `t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// Connection greeting or auth confirmation.
    Success(SuccessMessage),
    /// Error with code and description.
    Error(ErrorMessage),
    /// Subscription acknowledgement.
    Subscription(SubscriptionMessage),
    /// Price tick.
    Tick(TickMessage),
}

// =============================================================================
// Client Requests
// =============================================================================

/// Authentication request, sent after the connection greeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Request action (always "auth").
    pub action: String,

    /// API key of the account.
    pub api_key: String,

    /// Client code of the account.
    pub client_code: String,

    /// Bearer token issued by the external authenticator.
    pub token: String,
}

impl AuthRequest {
    /// Build an auth request.
    #[must_use]
    pub fn new(
        api_key: impl Into<String>,
        client_code: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            action: "auth".to_string(),
            api_key: api_key.into(),
            client_code: client_code.into(),
            token: token.into(),
        }
    }
}

/// Subscribe request for a set of instrument tokens.
///
/// The feed does not persist subscriptions across connections, so the
/// full set is sent once after every successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Request action (always "subscribe").
    pub action: String,

    /// Subscription mode. Only last-traded-price mode is used here.
    pub mode: String,

    /// Tokens to subscribe.
    pub tokens: Vec<String>,
}

impl SubscribeRequest {
    /// Build an LTP-mode subscribe request for the given tokens.
    #[must_use]
    pub fn ltp(tokens: Vec<String>) -> Self {
        Self {
            action: "subscribe".to_string(),
            mode: "ltp".to_string(),
            tokens,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
