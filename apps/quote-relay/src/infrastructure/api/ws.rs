//! Downstream WebSocket Handler
//!
//! One task per connected client. The handler validates the session
//! token before upgrading, registers the session with the registry,
//! pushes a full price snapshot, then forwards broadcast payloads until
//! the client disconnects or falls behind.
//!
//! Closing the socket promptly releases the registry entry; the
//! broadcaster independently drops sessions whose channel fills up or
//! closes, so a dead task never blocks the fan-out.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::AppState;
use crate::infrastructure::broadcast::SnapshotPush;
use crate::infrastructure::metrics;

/// Query parameters for `GET /stream`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    /// Session token from a prior `POST /login`.
    pub token: String,
}

/// Request a client can send over the stream.
#[derive(Debug, Clone, Deserialize)]
struct ClientCommand {
    /// Command name; only "subscribe" is understood.
    action: String,
    /// Symbols the session wants ticks for.
    #[serde(default)]
    instruments: Vec<String>,
}

/// `GET /stream?token=<uuid>`: upgrade to the tick stream.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.tokens.validate(&query.token) {
        tracing::debug!("Rejecting stream connection with invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    ws.on_upgrade(move |socket| client_session(socket, state))
}

/// Run one downstream session until disconnect.
async fn client_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (tx, mut rx) = mpsc::channel(state.session_buffer_capacity);
    let session_id = state.registry.register(tx);
    metrics::set_active_sessions(state.registry.len());
    tracing::info!(session_id, "Client connected");

    // Full snapshot first, then live ticks.
    let snapshot = SnapshotPush::from_cache(&state.instruments, &state.cache);
    match serde_json::to_string(&snapshot) {
        Ok(json) => {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                finish(&state, session_id);
                return;
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize snapshot");
            finish(&state, session_id);
            return;
        }
    }

    loop {
        tokio::select! {
            () = state.cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
            payload = rx.recv() => {
                match payload {
                    Some(payload) => {
                        if ws_tx
                            .send(Message::Text(payload.as_ref().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    // Channel closed: the broadcaster dropped us.
                    None => break,
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_command(&state, session_id, &text);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(session_id, error = %e, "Client socket error");
                        break;
                    }
                }
            }
        }
    }

    finish(&state, session_id);
}

/// Process a text frame from the client.
fn handle_client_command(state: &AppState, session_id: u64, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) if command.action == "subscribe" => {
            let count = state
                .registry
                .set_subscriptions(session_id, &command.instruments);
            tracing::debug!(session_id, instruments = ?count, "Subscriptions replaced");
        }
        Ok(command) => {
            tracing::debug!(session_id, action = %command.action, "Ignoring unknown action");
        }
        Err(e) => {
            tracing::debug!(session_id, error = %e, "Ignoring malformed client frame");
        }
    }
}

/// Release the session's registry entry. Idempotent with the
/// broadcaster's failure cleanup.
fn finish(state: &AppState, session_id: u64) {
    if state.registry.unregister(session_id) {
        tracing::info!(session_id, "Client disconnected");
    }
    metrics::set_active_sessions(state.registry.len());
}
