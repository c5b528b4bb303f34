//! Quote Relay Binary
//!
//! Starts the live index quote relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `FEED_API_KEY`: feed account API key
//! - `FEED_CLIENT_CODE`: feed account client code
//! - `FEED_PIN`: feed account PIN
//! - `FEED_ACCESS_TOKEN`: externally issued bearer token
//!
//! ## Optional
//! - `FEED_WS_URL`: upstream feed endpoint
//! - `QUOTE_RELAY_API_PORT`: REST/WebSocket port (default: 8080)
//! - `QUOTE_RELAY_INSTRUMENTS`: instrument mapping, e.g.
//!   "NSE:99926000:NIFTY,BSE:9991:SENSEX"
//! - `QUOTE_RELAY_RECONNECT_DELAY_INITIAL_MS` and friends: backoff tuning
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`
//! - `RUST_LOG`: log filter (default: info)

use std::sync::Arc;
use std::time::Instant;

use quote_relay::infrastructure::api::{ApiServer, AppState, SessionTokenStore};
use quote_relay::infrastructure::broadcast::Broadcaster;
use quote_relay::infrastructure::feed::{FeedClient, FeedEvent, FeedStatus, StaticAuthenticator};
use quote_relay::infrastructure::{metrics, telemetry};
use quote_relay::{
    ClientRegistry, InstrumentSet, OptionChainGenerator, Quote, QuoteCache, RelayConfig,
    init_metrics,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
#[allow(clippy::expect_used)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let _ = dotenvy::dotenv();

    // Initialize telemetry (tracing + optional OTLP export)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting quote relay");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Core state
    let instruments = Arc::new(InstrumentSet::new(config.instruments.clone()));
    let cache = Arc::new(QuoteCache::new(Arc::clone(&instruments)));
    let registry = Arc::new(ClientRegistry::new(Arc::clone(&instruments)));
    let broadcaster = Broadcaster::new(Arc::clone(&instruments), Arc::clone(&registry));
    let feed_status = Arc::new(FeedStatus::new());
    let tokens = Arc::new(SessionTokenStore::new());

    // External authenticator: the bearer token is provisioned out of band.
    let authenticator = Arc::new(StaticAuthenticator::new(
        config.credentials.clone(),
        config.access_token.clone(),
    ));

    // Feed client and its event channel
    let (feed_tx, feed_rx) = mpsc::channel::<FeedEvent>(config.broadcast.feed_event_capacity);
    let feed_client = Arc::new(FeedClient::new(
        config.feed_client_config(),
        config.credentials.clone(),
        authenticator.clone(),
        Arc::clone(&instruments),
        feed_tx,
        Arc::clone(&feed_status),
        shutdown_token.clone(),
    ));

    // API server state
    let state = Arc::new(AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: Instant::now(),
        instruments: Arc::clone(&instruments),
        cache: Arc::clone(&cache),
        registry: Arc::clone(&registry),
        tokens,
        authenticator,
        feed_status: Arc::clone(&feed_status),
        chains: OptionChainGenerator::new(),
        feed_api_key: config.credentials.api_key().to_string(),
        session_buffer_capacity: config.broadcast.session_buffer_capacity,
        cancel: shutdown_token.clone(),
    });
    let api_server = ApiServer::new(config.server.api_port, state, shutdown_token.clone());

    // Spawn the feed event handler
    tokio::spawn(async move {
        handle_feed_events(feed_rx, cache, broadcaster).await;
    });

    // Spawn the feed client
    let feed_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = feed_client.run().await {
            tracing::error!(error = %e, "Feed client stopped");
            // Auth rejection or exhausted backoff: nothing left to relay.
            feed_shutdown.cancel();
        }
    });

    // Spawn the API server
    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Quote relay ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Quote relay stopped");
    Ok(())
}

/// Apply feed events to the cache and fan ticks out to clients.
async fn handle_feed_events(
    mut rx: mpsc::Receiver<FeedEvent>,
    cache: Arc<QuoteCache>,
    broadcaster: Broadcaster,
) {
    while let Some(event) = rx.recv().await {
        match event {
            FeedEvent::Tick(tick) => {
                if cache.update(&tick.token, tick.ltp, tick.ts) {
                    let quote = Quote {
                        token: tick.token,
                        price: tick.ltp,
                        timestamp: tick.ts,
                    };
                    broadcaster.broadcast(&quote);
                } else {
                    tracing::warn!(token = %tick.token, "Dropping tick for unconfigured token");
                }
            }
            FeedEvent::Connected => {
                tracing::info!("Feed connected");
            }
            FeedEvent::Subscribed { tokens } => {
                metrics::set_feed_up(true);
                tracing::info!(tokens = tokens.len(), "Feed subscribed");
            }
            FeedEvent::Disconnected => {
                metrics::set_feed_up(false);
                tracing::warn!("Feed disconnected");
            }
            FeedEvent::Reconnecting { attempt } => {
                tracing::info!(attempt, "Feed reconnecting");
            }
            FeedEvent::Error(msg) => {
                tracing::error!(error = %msg, "Feed error");
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        api_port = config.server.api_port,
        instruments = config.instruments.len(),
        feed_url = %config.feed_url,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Internal shutdown requested");
        }
    }

    shutdown_token.cancel();
}
