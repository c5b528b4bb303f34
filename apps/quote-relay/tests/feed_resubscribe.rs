//! Feed Client Integration Tests
//!
//! Runs the feed client against a local mock feed server to verify the
//! connection lifecycle: handshake, subscription, tick flow, reconnect
//! with full re-subscription, and non-retried auth failures.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use quote_relay::{
    AuthError, BackoffConfig, Credentials, FeedClient, FeedClientConfig, FeedClientError,
    FeedEvent, FeedStatus, InstrumentSet, StaticAuthenticator,
};

const ALL_TOKENS: [&str; 4] = ["99926000", "99926037", "99926074", "9991"];

fn credentials() -> Credentials {
    Credentials::new("test-key", "C12345", "1234").unwrap()
}

fn client_config(addr: std::net::SocketAddr) -> FeedClientConfig {
    FeedClientConfig {
        url: format!("ws://{addr}"),
        backoff: BackoffConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: 0,
        },
        // Keep the heartbeat out of these short tests.
        ping_interval: Duration::from_secs(60),
        pong_timeout: Duration::from_secs(60),
    }
}

fn spawn_client(
    addr: std::net::SocketAddr,
    cancel: CancellationToken,
) -> (
    mpsc::Receiver<FeedEvent>,
    Arc<FeedStatus>,
    tokio::task::JoinHandle<Result<(), FeedClientError>>,
) {
    let (event_tx, event_rx) = mpsc::channel(256);
    let status = Arc::new(FeedStatus::new());
    let authenticator = Arc::new(StaticAuthenticator::new(
        credentials(),
        "issued-jwt".to_string(),
    ));

    let client = Arc::new(FeedClient::new(
        client_config(addr),
        credentials(),
        authenticator,
        Arc::new(InstrumentSet::defaults()),
        event_tx,
        Arc::clone(&status),
        cancel,
    ));

    let handle = tokio::spawn(client.run());
    (event_rx, status, handle)
}

/// Accept one connection and walk it through greeting, auth, and
/// subscription. Reports the subscribed tokens and returns the open
/// socket.
async fn accept_session(
    listener: &TcpListener,
    subs_tx: &mpsc::Sender<Vec<String>>,
) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    ws.send(Message::Text(
        r#"{"t":"success","msg":"connected"}"#.into(),
    ))
    .await
    .unwrap();

    expect_action(&mut ws, "auth").await;
    ws.send(Message::Text(
        r#"{"t":"success","msg":"authenticated"}"#.into(),
    ))
    .await
    .unwrap();

    let subscribe = expect_action(&mut ws, "subscribe").await;
    let tokens: Vec<String> = subscribe["tokens"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap().to_string())
        .collect();
    subs_tx.send(tokens.clone()).await.unwrap();

    let ack = serde_json::json!({ "t": "subscription", "tokens": tokens });
    ws.send(Message::Text(ack.to_string().into())).await.unwrap();

    ws
}

/// Read frames until one carries the expected `action`.
async fn expect_action(
    ws: &mut WebSocketStream<TcpStream>,
    action: &str,
) -> serde_json::Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for client request")
            .unwrap()
            .unwrap();

        if let Message::Text(text) = msg {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            if value["action"] == action {
                return value;
            }
        }
    }
}

async fn next_event(rx: &mut mpsc::Receiver<FeedEvent>) -> FeedEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for feed event")
        .expect("event channel closed")
}

/// Drain events until one matches, panicking on timeout.
async fn wait_for(
    rx: &mut mpsc::Receiver<FeedEvent>,
    mut predicate: impl FnMut(&FeedEvent) -> bool,
) -> FeedEvent {
    loop {
        let event = next_event(rx).await;
        if predicate(&event) {
            return event;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn connects_subscribes_and_relays_ticks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subs_tx, mut subs_rx) = mpsc::channel(8);

    let server = tokio::spawn(async move {
        let mut ws = accept_session(&listener, &subs_tx).await;
        ws.send(Message::Text(
            r#"{"t":"tick","token":"99926000","ltp":22510.5,"ts":"2026-08-07T09:15:00Z"}"#.into(),
        ))
        .await
        .unwrap();
        // Hold the connection open until the test is done.
        let _ = timeout(Duration::from_secs(5), ws.next()).await;
    });

    let cancel = CancellationToken::new();
    let (mut events, status, handle) = spawn_client(addr, cancel.clone());

    assert!(matches!(next_event(&mut events).await, FeedEvent::Connected));

    let subscribed = next_event(&mut events).await;
    match subscribed {
        FeedEvent::Subscribed { tokens } => assert_eq!(tokens, ALL_TOKENS),
        other => panic!("expected Subscribed, got {other:?}"),
    }
    assert!(status.state().is_live());

    let tick = next_event(&mut events).await;
    match tick {
        FeedEvent::Tick(tick) => {
            assert_eq!(tick.token, "99926000");
            assert_eq!(tick.ltp.to_string(), "22510.5");
        }
        other => panic!("expected Tick, got {other:?}"),
    }

    // Exactly one subscribe request on this connection.
    let subs = subs_rx.recv().await.unwrap();
    assert_eq!(subs, ALL_TOKENS);
    assert!(subs_rx.try_recv().is_err());

    cancel.cancel();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.abort();
}

#[tokio::test]
async fn reconnects_and_resubscribes_full_set_after_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subs_tx, mut subs_rx) = mpsc::channel(8);

    let server = tokio::spawn(async move {
        // First connection: handshake, then drop mid-stream.
        let ws = accept_session(&listener, &subs_tx).await;
        drop(ws);

        // Second connection: full handshake again, then stay up.
        let mut ws = accept_session(&listener, &subs_tx).await;
        let _ = timeout(Duration::from_secs(5), ws.next()).await;
    });

    let cancel = CancellationToken::new();
    let (mut events, status, handle) = spawn_client(addr, cancel.clone());

    let _ = wait_for(&mut events, |e| matches!(e, FeedEvent::Subscribed { .. })).await;

    let dropped_at = Instant::now();
    let _ = wait_for(&mut events, |e| matches!(e, FeedEvent::Disconnected)).await;
    let _ = wait_for(&mut events, |e| matches!(e, FeedEvent::Reconnecting { .. })).await;

    // Resubscribed on the new connection.
    let _ = wait_for(&mut events, |e| matches!(e, FeedEvent::Subscribed { .. })).await;
    assert!(status.state().is_live());

    // The new attempt happened within one backoff interval (50ms) plus
    // handshake slack.
    assert!(
        dropped_at.elapsed() < Duration::from_secs(2),
        "reconnect took {:?}",
        dropped_at.elapsed()
    );

    // Exactly one full subscription per connection: two connections, two
    // identical subscribe requests.
    let first = subs_rx.recv().await.unwrap();
    let second = subs_rx.recv().await.unwrap();
    assert_eq!(first, ALL_TOKENS);
    assert_eq!(second, ALL_TOKENS);
    assert!(subs_rx.try_recv().is_err());

    cancel.cancel();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.abort();
}

#[tokio::test]
async fn auth_rejection_is_fatal_and_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (attempts_tx, mut attempts_rx) = mpsc::channel::<()>(8);
    let server = tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            attempts_tx.send(()).await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            ws.send(Message::Text(
                r#"{"t":"success","msg":"connected"}"#.into(),
            ))
            .await
            .unwrap();
            expect_action(&mut ws, "auth").await;
            ws.send(Message::Text(
                r#"{"t":"error","code":402,"msg":"invalid credentials"}"#.into(),
            ))
            .await
            .unwrap();
        }
    });

    let cancel = CancellationToken::new();
    let (mut events, _status, handle) = spawn_client(addr, cancel);

    let result = timeout(Duration::from_secs(5), handle)
        .await
        .expect("client should stop on auth rejection")
        .unwrap();
    assert!(matches!(
        result,
        Err(FeedClientError::Auth(AuthError::InvalidCredentials))
    ));

    // The failure was surfaced as an event too.
    let _ = wait_for(&mut events, |e| matches!(e, FeedEvent::Error(_))).await;

    // One connection attempt, no retry.
    assert!(attempts_rx.recv().await.is_some());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(attempts_rx.try_recv().is_err(), "auth failure must not retry");

    server.abort();
}

#[tokio::test]
async fn malformed_frames_are_dropped_not_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subs_tx, _subs_rx) = mpsc::channel(8);

    let server = tokio::spawn(async move {
        let mut ws = accept_session(&listener, &subs_tx).await;

        // Garbage in several shapes, then a valid tick.
        ws.send(Message::Text("not json at all".into())).await.unwrap();
        ws.send(Message::Text(r#"{"t":"depth","token":"1"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(r#"{"token":"99926000","ltp":1}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(
            r#"{"t":"tick","token":"99926037","ltp":48200.0,"ts":"2026-08-07T09:16:00Z"}"#.into(),
        ))
        .await
        .unwrap();

        let _ = timeout(Duration::from_secs(5), ws.next()).await;
    });

    let cancel = CancellationToken::new();
    let (mut events, _status, handle) = spawn_client(addr, cancel.clone());

    let tick = wait_for(&mut events, |e| matches!(e, FeedEvent::Tick(_))).await;
    match tick {
        FeedEvent::Tick(tick) => assert_eq!(tick.token, "99926037"),
        other => panic!("expected Tick, got {other:?}"),
    }

    cancel.cancel();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.abort();
}
