//! REST Handlers
//!
//! The JSON endpoints of the relay: the login exchange that issues
//! downstream session tokens, cached price reads, and the synthetic
//! option-chain endpoint.
//!
//! Price reads serve the last successfully cached value even during an
//! upstream outage, with no staleness flag. Callers that need freshness
//! guarantees must watch the stream instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::infrastructure::feed::auth::Credentials;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of the login exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Account client code.
    pub client_code: String,
    /// Account PIN.
    pub pin: String,
}

/// Response of the login exchange.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Whether login succeeded.
    pub success: bool,
    /// Downstream session token, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Human-readable outcome.
    pub message: String,
}

/// Query parameters for `GET /prices`.
#[derive(Debug, Clone, Deserialize)]
pub struct PricesQuery {
    /// Restrict the response to one symbol.
    pub symbol: Option<String>,
}

/// Response of `GET /prices`.
#[derive(Debug, Clone, Serialize)]
pub struct PricesResponse {
    /// Always `true` on this path.
    pub success: bool,
    /// Last cached price per symbol, two-decimal text.
    pub prices: BTreeMap<String, String>,
    /// Time the response was produced.
    pub timestamp: DateTime<Utc>,
}

/// Query parameters for `GET /option-chain`.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionChainQuery {
    /// Index symbol to build the chain for.
    pub symbol: String,
}

/// Response of `GET /option-chain`.
#[derive(Debug, Clone, Serialize)]
pub struct OptionChainResponse {
    /// Always `true` on this path.
    pub success: bool,
    /// Requested symbol.
    pub symbol: String,
    /// Spot price the chain was generated from.
    pub spot: String,
    /// Always `true`: this data is generated, not observed.
    pub synthetic: bool,
    /// Generated strike rows.
    pub option_chain: Vec<crate::infrastructure::synthetic::SyntheticChainRow>,
    /// Time the chain was generated.
    pub timestamp: DateTime<Utc>,
}

/// Error body shared by all REST endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Always `false` on this path.
    pub success: bool,
    /// Human-readable reason.
    pub message: String,
}

impl ErrorResponse {
    fn respond(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                success: false,
                message: message.into(),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /login`: exchange account credentials for a session token.
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let credentials = match Credentials::new(
        state.feed_api_key.clone(),
        request.client_code,
        request.pin,
    ) {
        Ok(credentials) => credentials,
        Err(e) => return ErrorResponse::respond(StatusCode::BAD_REQUEST, e.to_string()),
    };

    match state.authenticator.login(&credentials).await {
        Ok(_token) => {
            // The upstream token stays server-side; clients only ever see
            // the relay's own session token.
            let session_token = state.tokens.issue();
            tracing::info!(client_code = credentials.client_code(), "Login succeeded");

            Json(LoginResponse {
                success: true,
                token: Some(session_token),
                message: "login successful".to_string(),
            })
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Login rejected");
            ErrorResponse::respond(StatusCode::UNAUTHORIZED, e.to_string())
        }
    }
}

/// `GET /prices[?symbol=X]`: last cached price per instrument.
pub async fn prices_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PricesQuery>,
) -> Response {
    let snapshot = state.cache.snapshot();

    let selected: Vec<&crate::domain::instrument::Instrument> = match &query.symbol {
        Some(symbol) => match state.instruments.by_symbol(symbol) {
            Some(instrument) => vec![instrument],
            None => {
                return ErrorResponse::respond(
                    StatusCode::NOT_FOUND,
                    format!("unknown symbol: {symbol}"),
                );
            }
        },
        None => state.instruments.iter().collect(),
    };

    let prices = selected
        .into_iter()
        .filter_map(|instrument| {
            snapshot
                .get(&instrument.token)
                .map(|quote| (instrument.symbol.clone(), format!("{:.2}", quote.price)))
        })
        .collect();

    Json(PricesResponse {
        success: true,
        prices,
        timestamp: Utc::now(),
    })
    .into_response()
}

/// `GET /option-chain?symbol=X`: synthetic chain around the cached spot.
pub async fn option_chain_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OptionChainQuery>,
) -> Response {
    let Some(instrument) = state.instruments.by_symbol(&query.symbol) else {
        return ErrorResponse::respond(
            StatusCode::NOT_FOUND,
            format!("unknown symbol: {}", query.symbol),
        );
    };

    let Some(quote) = state.cache.get(&instrument.token) else {
        return ErrorResponse::respond(
            StatusCode::NOT_FOUND,
            format!("no price observed yet for {}", query.symbol),
        );
    };

    let Some(chain) = state.chains.generate(&instrument.symbol, quote.price) else {
        return ErrorResponse::respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            "spot price out of range".to_string(),
        );
    };

    Json(OptionChainResponse {
        success: true,
        symbol: instrument.symbol.clone(),
        spot: format!("{:.2}", quote.price),
        synthetic: true,
        option_chain: chain,
        timestamp: Utc::now(),
    })
    .into_response()
}
