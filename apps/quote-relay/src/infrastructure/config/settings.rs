//! Relay Configuration Settings
//!
//! Configuration types for the relay, loaded from environment variables.
//! A missing or malformed instrument mapping is fatal at startup; tunables
//! fall back to defaults when unset or unparsable.

use std::time::Duration;

use crate::domain::instrument::{Exchange, Instrument};
use crate::infrastructure::feed::auth::Credentials;
use crate::infrastructure::feed::client::FeedClientConfig;
use crate::infrastructure::feed::reconnect::BackoffConfig;

/// Default upstream feed endpoint.
const DEFAULT_FEED_URL: &str = "wss://stream.marketfeed.in/v1/ltp";

/// WebSocket connection settings for the upstream feed.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Interval between outbound pings.
    pub ping_interval: Duration,
    /// Silence tolerated after a ping before reconnecting.
    pub pong_timeout: Duration,
    /// Delay before the first reconnection attempt.
    pub reconnect_delay_initial: Duration,
    /// Ceiling for the reconnect delay.
    pub reconnect_delay_max: Duration,
    /// Backoff growth factor (1.0 = fixed delay).
    pub reconnect_delay_multiplier: f64,
    /// Reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(30),
            reconnect_delay_initial: Duration::from_secs(5),
            reconnect_delay_max: Duration::from_secs(60),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
        }
    }
}

/// Channel capacity settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Outbound buffer per downstream session; a session that falls this
    /// far behind is dropped.
    pub session_buffer_capacity: usize,
    /// Capacity of the feed event channel.
    pub feed_event_capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            session_buffer_capacity: 256,
            feed_event_capacity: 1_024,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port for the REST + WebSocket API (and health/metrics).
    pub api_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { api_port: 8080 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Feed account credentials.
    pub credentials: Credentials,
    /// Externally issued bearer token for the feed.
    pub access_token: String,
    /// Upstream feed WebSocket URL.
    pub feed_url: String,
    /// Configured instrument universe.
    pub instruments: Vec<Instrument>,
    /// Server port settings.
    pub server: ServerSettings,
    /// Upstream WebSocket settings.
    pub websocket: WebSocketSettings,
    /// Channel capacity settings.
    pub broadcast: BroadcastSettings,
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a required variable is missing or empty,
    /// or when the instrument mapping is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_env("FEED_API_KEY")?;
        let client_code = require_env("FEED_CLIENT_CODE")?;
        let pin = require_env("FEED_PIN")?;
        let access_token = require_env("FEED_ACCESS_TOKEN")?;

        let credentials = Credentials::new(api_key, client_code, pin)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let feed_url =
            std::env::var("FEED_WS_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());

        let instruments = match std::env::var("QUOTE_RELAY_INSTRUMENTS") {
            Ok(mapping) => parse_instruments(&mapping)?,
            Err(_) => default_instruments(),
        };

        let server = ServerSettings {
            api_port: parse_env_u16("QUOTE_RELAY_API_PORT", ServerSettings::default().api_port),
        };

        let defaults = WebSocketSettings::default();
        let websocket = WebSocketSettings {
            ping_interval: parse_env_duration_secs(
                "QUOTE_RELAY_PING_INTERVAL_SECS",
                defaults.ping_interval,
            ),
            pong_timeout: parse_env_duration_secs(
                "QUOTE_RELAY_PONG_TIMEOUT_SECS",
                defaults.pong_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "QUOTE_RELAY_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "QUOTE_RELAY_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "QUOTE_RELAY_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "QUOTE_RELAY_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
        };

        let broadcast_defaults = BroadcastSettings::default();
        let broadcast = BroadcastSettings {
            session_buffer_capacity: parse_env_usize(
                "QUOTE_RELAY_SESSION_BUFFER_CAPACITY",
                broadcast_defaults.session_buffer_capacity,
            ),
            feed_event_capacity: parse_env_usize(
                "QUOTE_RELAY_FEED_EVENT_CAPACITY",
                broadcast_defaults.feed_event_capacity,
            ),
        };

        Ok(Self {
            credentials,
            access_token,
            feed_url,
            instruments,
            server,
            websocket,
            broadcast,
        })
    }

    /// Feed client configuration derived from these settings.
    #[must_use]
    pub fn feed_client_config(&self) -> FeedClientConfig {
        FeedClientConfig {
            url: self.feed_url.clone(),
            backoff: BackoffConfig {
                initial_delay: self.websocket.reconnect_delay_initial,
                max_delay: self.websocket.reconnect_delay_max,
                multiplier: self.websocket.reconnect_delay_multiplier,
                jitter: 0.1,
                max_attempts: self.websocket.max_reconnect_attempts,
            },
            ping_interval: self.websocket.ping_interval,
            pong_timeout: self.websocket.pong_timeout,
        }
    }
}

/// The built-in instrument universe.
fn default_instruments() -> Vec<Instrument> {
    crate::domain::instrument::InstrumentSet::defaults()
        .iter()
        .cloned()
        .collect()
}

/// Parse an instrument mapping of the form
/// `"NSE:99926000:NIFTY,NSE:99926037:BANKNIFTY"`.
fn parse_instruments(mapping: &str) -> Result<Vec<Instrument>, ConfigError> {
    let mut instruments: Vec<Instrument> = Vec::new();

    for entry in mapping.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let mut parts = entry.splitn(3, ':');
        let (Some(exchange), Some(token), Some(symbol)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ConfigError::InvalidInstrument(entry.to_string()));
        };

        let Some(exchange) = Exchange::from_code(exchange) else {
            return Err(ConfigError::InvalidInstrument(entry.to_string()));
        };

        if token.is_empty() || symbol.is_empty() {
            return Err(ConfigError::InvalidInstrument(entry.to_string()));
        }

        if instruments
            .iter()
            .any(|i| i.token == token || i.symbol == symbol)
        {
            return Err(ConfigError::DuplicateInstrument(entry.to_string()));
        }

        instruments.push(Instrument::new(exchange, token, symbol));
    }

    if instruments.is_empty() {
        return Err(ConfigError::NoInstruments);
    }

    Ok(instruments)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has an empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// A configured value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Instrument entry could not be parsed.
    #[error("invalid instrument mapping entry: {0}")]
    InvalidInstrument(String),
    /// Instrument entry repeats a token or symbol.
    #[error("duplicate instrument mapping entry: {0}")]
    DuplicateInstrument(String),
    /// Instrument mapping resolved to an empty universe.
    #[error("instrument mapping is empty")]
    NoInstruments,
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

// =============================================================================
// Tests
// =============================================================================
