//! Instrument Identifiers
//!
//! An instrument is a tradable index identified by an exchange-scoped
//! numeric token (the key used by the upstream feed) and a human-readable
//! symbol (the key used by downstream clients). The set of instruments is
//! fixed at startup; every quote the relay caches or broadcasts must
//! belong to it.

use std::collections::HashMap;

// =============================================================================
// Types
// =============================================================================

/// Numeric exchange token as sent by the upstream feed (e.g. "99926000").
pub type InstrumentToken = String;

/// Exchange an instrument trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exchange {
    /// National Stock Exchange.
    Nse,
    /// Bombay Stock Exchange.
    Bse,
}

impl Exchange {
    /// Parse an exchange from its short code.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "NSE" => Some(Self::Nse),
            "BSE" => Some(Self::Bse),
            _ => None,
        }
    }

    /// Short code for the exchange.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nse => "NSE",
            Self::Bse => "BSE",
        }
    }
}

/// A single configured instrument. Immutable once the universe is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Exchange the token is scoped to.
    pub exchange: Exchange,
    /// Upstream feed token.
    pub token: InstrumentToken,
    /// Human-readable symbol (e.g. "NIFTY").
    pub symbol: String,
}

impl Instrument {
    /// Create a new instrument.
    #[must_use]
    pub fn new(exchange: Exchange, token: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange,
            token: token.into(),
            symbol: symbol.into(),
        }
    }
}

// =============================================================================
// Instrument Universe
// =============================================================================

/// The fixed set of instruments the relay tracks.
///
/// Built once at startup from configuration and shared read-only across
/// the feed connector, quote cache, registry, and API handlers. Provides
/// lookup in both directions: by upstream token and by downstream symbol.
#[derive(Debug, Clone)]
pub struct InstrumentSet {
    by_token: HashMap<InstrumentToken, Instrument>,
    by_symbol: HashMap<String, InstrumentToken>,
    ordered_tokens: Vec<InstrumentToken>,
}

impl InstrumentSet {
    /// Build the universe from a list of instruments.
    ///
    /// Duplicate tokens or symbols must be rejected by the caller
    /// (configuration validation); later entries would otherwise shadow
    /// earlier ones.
    #[must_use]
    pub fn new(instruments: Vec<Instrument>) -> Self {
        let mut by_token = HashMap::with_capacity(instruments.len());
        let mut by_symbol = HashMap::with_capacity(instruments.len());
        let mut ordered_tokens = Vec::with_capacity(instruments.len());

        for instrument in instruments {
            by_symbol.insert(instrument.symbol.clone(), instrument.token.clone());
            ordered_tokens.push(instrument.token.clone());
            by_token.insert(instrument.token.clone(), instrument);
        }

        Self {
            by_token,
            by_symbol,
            ordered_tokens,
        }
    }

    /// The default universe: the four index instruments the relay was
    /// built for, with their NSE/BSE feed tokens.
    #[must_use]
    pub fn defaults() -> Self {
        Self::new(vec![
            Instrument::new(Exchange::Nse, "99926000", "NIFTY"),
            Instrument::new(Exchange::Nse, "99926037", "BANKNIFTY"),
            Instrument::new(Exchange::Nse, "99926074", "FINNIFTY"),
            Instrument::new(Exchange::Bse, "9991", "SENSEX"),
        ])
    }

    /// Look up an instrument by its upstream token.
    #[must_use]
    pub fn by_token(&self, token: &str) -> Option<&Instrument> {
        self.by_token.get(token)
    }

    /// Look up an instrument by its downstream symbol.
    #[must_use]
    pub fn by_symbol(&self, symbol: &str) -> Option<&Instrument> {
        self.by_symbol
            .get(symbol)
            .and_then(|token| self.by_token.get(token))
    }

    /// Whether the universe contains the given token.
    #[must_use]
    pub fn contains_token(&self, token: &str) -> bool {
        self.by_token.contains_key(token)
    }

    /// All tokens, in configuration order (the order used for upstream
    /// subscribe requests).
    #[must_use]
    pub fn tokens(&self) -> &[InstrumentToken] {
        &self.ordered_tokens
    }

    /// Iterate over all instruments in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.ordered_tokens
            .iter()
            .filter_map(|token| self.by_token.get(token))
    }

    /// Number of instruments in the universe.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Whether the universe is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
