//! Synthetic Option Chain Generator
//!
//! Produces indicative option chains from a spot price. Premiums, deltas
//! and fair values are randomized around simple distance-to-strike
//! heuristics: this is demo data, not market data, and it never feeds
//! back into the live quote path. Responses built from it are flagged
//! `synthetic` so downstream consumers cannot mistake it for the real
//! thing.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

/// Strikes generated on each side of the at-the-money strike.
const STRIKES_EACH_SIDE: i64 = 2;

/// One leg (call or put) of a generated chain row.
#[derive(Debug, Clone, Serialize)]
pub struct SyntheticLeg {
    /// Indicative last traded price.
    pub ltp: String,
    /// Indicative fair value (premium plus a fixed margin).
    pub fair_value: String,
    /// Indicative delta.
    pub delta: String,
}

/// One strike row of a generated chain.
#[derive(Debug, Clone, Serialize)]
pub struct SyntheticChainRow {
    /// Strike price.
    pub strike: i64,
    /// Call leg.
    pub call: SyntheticLeg,
    /// Put leg.
    pub put: SyntheticLeg,
}

/// Generates indicative option chains around a spot price.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptionChainGenerator;

impl OptionChainGenerator {
    /// Create a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Strike spacing for an index symbol.
    #[must_use]
    pub fn strike_step(symbol: &str) -> i64 {
        if symbol == "BANKNIFTY" { 100 } else { 50 }
    }

    /// Strike nearest the spot, on the symbol's strike grid.
    #[must_use]
    pub fn atm_strike(symbol: &str, spot: f64) -> i64 {
        let step = Self::strike_step(symbol);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let atm = (spot / step as f64).round() as i64 * step;
        atm
    }

    /// Generate a chain of strikes around the money.
    ///
    /// Returns `None` when the spot cannot be represented as a float
    /// (which real index levels always can).
    #[must_use]
    pub fn generate(&self, symbol: &str, spot: Decimal) -> Option<Vec<SyntheticChainRow>> {
        let spot = spot.to_f64()?;
        let step = Self::strike_step(symbol);
        let atm = Self::atm_strike(symbol, spot);
        let mut rng = rand::rng();

        let chain = (-STRIKES_EACH_SIDE..=STRIKES_EACH_SIDE)
            .map(|offset| {
                let strike = atm + offset * step;
                #[allow(clippy::cast_precision_loss)]
                let distance = (spot - strike as f64).abs();
                let base_premium = (200.0 - distance * 0.3).max(10.0);

                let call_premium = base_premium * rng.random_range(0.9..=1.1);
                let put_premium = base_premium * rng.random_range(0.9..=1.1);

                SyntheticChainRow {
                    strike,
                    call: SyntheticLeg {
                        ltp: format!("{call_premium:.2}"),
                        fair_value: format!("{:.2}", call_premium * 1.05),
                        delta: format!("{:.3}", rng.random_range(0.3..=0.7)),
                    },
                    put: SyntheticLeg {
                        ltp: format!("{put_premium:.2}"),
                        fair_value: format!("{:.2}", put_premium * 1.05),
                        delta: format!("{:.3}", -rng.random_range(0.3..=0.7)),
                    },
                }
            })
            .collect();

        Some(chain)
    }
}

// =============================================================================
// Tests
// =============================================================================
