//! Upstream Feed Adapter
//!
//! WebSocket client for the upstream market data feed:
//!
//! - `auth`: credentials, bearer tokens, handshake state machine
//! - `messages` / `codec`: JSON wire format
//! - `reconnect`: backoff policy
//! - `status`: shared connection lifecycle view
//! - `client`: connection supervisor and receive loop

pub mod auth;
pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod status;

pub use auth::{AccessToken, AuthError, AuthHandler, AuthState, Credentials, StaticAuthenticator};
pub use client::{FeedClient, FeedClientConfig, FeedClientError, FeedEvent};
pub use codec::{CodecError, FeedCodec};
pub use messages::{
    AuthRequest, ErrorMessage, FeedMessage, SubscribeRequest, SubscriptionMessage, SuccessKind,
    SuccessMessage, TickMessage,
};
pub use reconnect::{BackoffConfig, BackoffPolicy};
pub use status::{ConnectionState, FeedStatus};
