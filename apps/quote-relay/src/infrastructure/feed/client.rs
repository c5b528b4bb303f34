//! Upstream Feed Client
//!
//! Owns the single WebSocket connection to the market data feed and its
//! whole lifecycle: connect, authenticate, subscribe the configured
//! instrument set, decode ticks, detect silence via ping/pong, and
//! reconnect with backoff when the transport drops.
//!
//! There is at most one upstream connection at any time: the supervisor
//! loop is strictly sequential and a new attempt only starts after the
//! previous connection has fully closed. The bearer token is borrowed
//! from the `Authenticator` before each attempt and dropped with the
//! connection.
//!
//! Authentication failures terminate the loop and surface to the caller;
//! they are never retried. Only transport-level failures go through the
//! backoff path.

use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::auth::{AuthError, AuthHandler, Credentials};
use super::codec::FeedCodec;
use super::messages::{FeedMessage, SubscribeRequest, TickMessage};
use super::reconnect::{BackoffConfig, BackoffPolicy};
use super::status::{ConnectionState, FeedStatus};
use crate::application::ports::Authenticator;
use crate::domain::instrument::InstrumentSet;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the feed client.
#[derive(Debug, thiserror::Error)]
pub enum FeedClientError {
    /// WebSocket connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Authentication rejected; not retried.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The feed stopped responding to pings.
    #[error("heartbeat timeout")]
    HeartbeatTimeout,

    /// The server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// The event consumer went away; nothing left to relay to.
    #[error("event channel closed")]
    EventChannelClosed,

    /// Backoff attempts exhausted.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

impl FeedClientError {
    /// Whether this failure is recoverable via reconnection.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::WebSocket(_)
                | Self::HeartbeatTimeout
                | Self::ConnectionClosed
        )
    }
}

// =============================================================================
// Feed Events
// =============================================================================

/// Events emitted by the feed client to the relay core.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Authenticated on a fresh connection.
    Connected,
    /// Subscription acknowledged for the listed tokens.
    Subscribed {
        /// Tokens confirmed by the feed.
        tokens: Vec<String>,
    },
    /// A price tick arrived.
    Tick(TickMessage),
    /// The connection dropped.
    Disconnected,
    /// A reconnection attempt is starting.
    Reconnecting {
        /// Attempt number since the last successful subscription.
        attempt: u32,
    },
    /// The feed reported a post-auth error.
    Error(String),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// WebSocket URL of the feed.
    pub url: String,
    /// Reconnect backoff settings.
    pub backoff: BackoffConfig,
    /// Interval between outbound pings.
    pub ping_interval: std::time::Duration,
    /// Silence tolerated after a ping before the connection is declared
    /// dead.
    pub pong_timeout: std::time::Duration,
}

impl FeedClientConfig {
    /// Create a configuration with default backoff and heartbeat.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: BackoffConfig::default(),
            ping_interval: std::time::Duration::from_secs(20),
            pong_timeout: std::time::Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Feed Client
// =============================================================================

/// WebSocket client and reconnection supervisor for the upstream feed.
pub struct FeedClient {
    config: FeedClientConfig,
    credentials: Credentials,
    authenticator: Arc<dyn Authenticator>,
    instruments: Arc<InstrumentSet>,
    codec: FeedCodec,
    event_tx: mpsc::Sender<FeedEvent>,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
}

impl FeedClient {
    /// Create a new feed client.
    #[must_use]
    pub fn new(
        config: FeedClientConfig,
        credentials: Credentials,
        authenticator: Arc<dyn Authenticator>,
        instruments: Arc<InstrumentSet>,
        event_tx: mpsc::Sender<FeedEvent>,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            credentials,
            authenticator,
            instruments,
            codec: FeedCodec::new(),
            event_tx,
            status,
            cancel,
        }
    }

    /// Run the supervisor loop until cancelled or an unrecoverable error.
    ///
    /// # Errors
    ///
    /// Returns `FeedClientError::Auth` when the feed rejects the
    /// credentials (never retried), or `MaxReconnectAttemptsExceeded`
    /// when a bounded backoff policy is exhausted.
    pub async fn run(self: Arc<Self>) -> Result<(), FeedClientError> {
        let mut backoff = BackoffPolicy::new(self.config.backoff.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Feed client cancelled");
                return Ok(());
            }

            self.status.set_state(ConnectionState::Connecting);

            match self.connect_and_stream(&mut backoff).await {
                Ok(()) => {
                    self.status.set_state(ConnectionState::Disconnected);
                    tracing::info!("Feed connection closed gracefully");
                    return Ok(());
                }
                Err(FeedClientError::Auth(e)) => {
                    self.status.set_state(ConnectionState::Disconnected);
                    self.status.set_error(e.to_string());
                    let _ = self.event_tx.send(FeedEvent::Error(e.to_string())).await;
                    tracing::error!(error = %e, "Feed authentication rejected, not retrying");
                    return Err(FeedClientError::Auth(e));
                }
                Err(e) => {
                    self.status.set_state(ConnectionState::Disconnected);
                    tracing::warn!(error = %e, "Feed connection lost");
                    metrics::record_feed_error("transport");
                    let _ = self.event_tx.send(FeedEvent::Disconnected).await;

                    let Some(delay) = backoff.next_delay() else {
                        return Err(FeedClientError::MaxReconnectAttemptsExceeded);
                    };

                    let attempt = backoff.attempt_count();
                    self.status.record_reconnect_attempt();
                    metrics::record_reconnect();
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Reconnecting to feed"
                    );
                    let _ = self.event_tx.send(FeedEvent::Reconnecting { attempt }).await;

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Feed client cancelled during backoff");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Run a single connection from dial to close.
    async fn connect_and_stream(
        &self,
        backoff: &mut BackoffPolicy,
    ) -> Result<(), FeedClientError> {
        // Fresh token per attempt; it does not outlive this connection.
        let token = self.authenticator.login(&self.credentials).await?;

        tracing::info!(url = %self.config.url, "Connecting to feed");
        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        self.status.set_state(ConnectionState::Authenticating);
        let mut auth_handler = AuthHandler::new(self.credentials.clone(), token);

        let mut ping_interval = tokio::time::interval(self.config.ping_interval);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // Skip the immediate first tick so the handshake goes out first.
        ping_interval.tick().await;

        let mut last_pong = Instant::now();
        let mut awaiting_pong = false;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = ping_interval.tick() => {
                    if awaiting_pong && last_pong.elapsed() > self.config.pong_timeout {
                        tracing::warn!(
                            silence_secs = last_pong.elapsed().as_secs(),
                            "Feed heartbeat timeout"
                        );
                        return Err(FeedClientError::HeartbeatTimeout);
                    }
                    write.send(Message::Ping(vec![].into())).await?;
                    awaiting_pong = true;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&text, &mut auth_handler, &mut write, backoff)
                                .await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            last_pong = Instant::now();
                            awaiting_pong = false;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Feed sent close frame");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Binary frames are not part of the protocol.
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("Feed stream ended");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Handle one text frame from the feed.
    async fn handle_frame<W>(
        &self,
        text: &str,
        auth_handler: &mut AuthHandler,
        write: &mut W,
        backoff: &mut BackoffPolicy,
    ) -> Result<(), FeedClientError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let messages = match self.codec.decode(text) {
            Ok(messages) => messages,
            Err(e) => {
                // Malformed input is dropped, never fatal.
                tracing::warn!(error = %e, "Dropping malformed feed frame");
                metrics::record_feed_error("malformed_frame");
                return Ok(());
            }
        };

        for message in messages {
            match message {
                FeedMessage::Success(success) => {
                    if auth_handler.on_success(&success) {
                        tracing::info!("Feed authenticated");
                        let _ = self.event_tx.send(FeedEvent::Connected).await;
                        self.send_subscribe(write).await?;
                    } else {
                        let request = auth_handler.create_auth_request();
                        self.send_request(write, &request, "auth").await?;
                    }
                }
                FeedMessage::Error(error) => {
                    tracing::error!(code = error.code, msg = %error.msg, "Feed error");

                    if !auth_handler.is_authenticated() {
                        return Err(auth_handler.on_error(&error).into());
                    }

                    self.status.set_error(error.msg.clone());
                    metrics::record_feed_error("upstream");
                    let _ = self.event_tx.send(FeedEvent::Error(error.msg)).await;
                }
                FeedMessage::Subscription(ack) => {
                    tracing::info!(tokens = ack.tokens.len(), "Feed subscription confirmed");
                    self.status.set_state(ConnectionState::Subscribed);
                    backoff.reset();
                    let _ = self
                        .event_tx
                        .send(FeedEvent::Subscribed { tokens: ack.tokens })
                        .await;
                }
                FeedMessage::Tick(tick) => {
                    self.status.record_tick();
                    metrics::record_tick_received();
                    if self.event_tx.send(FeedEvent::Tick(tick)).await.is_err() {
                        return Err(FeedClientError::EventChannelClosed);
                    }
                }
            }
        }

        Ok(())
    }

    /// Send the full configured subscription set.
    ///
    /// Issued exactly once per connection, right after authentication;
    /// the feed forgets subscriptions across connections.
    async fn send_subscribe<W>(&self, write: &mut W) -> Result<(), FeedClientError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let request = SubscribeRequest::ltp(self.instruments.tokens().to_vec());
        tracing::debug!(tokens = request.tokens.len(), "Sending subscribe request");
        self.send_request(write, &request, "subscribe").await
    }

    async fn send_request<W, T>(
        &self,
        write: &mut W,
        request: &T,
        what: &str,
    ) -> Result<(), FeedClientError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
        T: serde::Serialize,
    {
        let json = self.codec.encode(request).map_err(|e| {
            FeedClientError::ConnectionFailed(format!("failed to serialize {what}: {e}"))
        })?;

        write.send(Message::Text(json.into())).await.map_err(|e| {
            FeedClientError::ConnectionFailed(format!("failed to send {what}: {e}"))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
