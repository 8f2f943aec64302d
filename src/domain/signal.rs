//! Signal construction: conviction scoring, direction, cooldown guard.

use super::candle::{Candle, Timeframe};
use super::rule::{RuleContext, RuleKind, RuleSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const CONVICTION_BASE: u32 = 50;
pub const CONVICTION_MAX: u32 = 98;

/// Minimum price movement since the last emitted signal before a new one
/// may fire, in price units.
pub const COOLDOWN_DISTANCE: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An emitted trading signal. Immutable and terminal: persisted, published
/// and logged, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    pub symbol: String,
    pub price: f64,
    pub direction: Direction,
    pub rules_passed: Vec<RuleKind>,
    pub rules_failed: Vec<RuleKind>,
    pub conviction: u32,
    pub timeframe: Timeframe,
}

/// Evaluates closed candles against the rule table.
///
/// Pure except for the cooldown state: `last_signal_price` is
/// per-instrument, updated only when a signal is actually emitted.
pub struct SignalEngine {
    symbol: String,
    rules: RuleSet,
    last_signal_price: Option<f64>,
    suppress_in_safe_mode: bool,
}

impl SignalEngine {
    pub fn new(symbol: impl Into<String>, rules: RuleSet) -> Self {
        SignalEngine {
            symbol: symbol.into(),
            rules,
            last_signal_price: None,
            suppress_in_safe_mode: false,
        }
    }

    /// Opt in to suppressing signals while the calendar monitor has raised
    /// safe mode. Off by default.
    pub fn suppress_in_safe_mode(mut self, on: bool) -> Self {
        self.suppress_in_safe_mode = on;
        self
    }

    pub fn last_signal_price(&self) -> Option<f64> {
        self.last_signal_price
    }

    /// Evaluate one closed candle. Returns `None` when no rule passed, when
    /// the close is inside the cooldown distance of the last signal, or
    /// when safe-mode suppression applies.
    pub fn evaluate(
        &mut self,
        candle: &Candle,
        timeframe: Timeframe,
        ctx: &RuleContext,
    ) -> Option<Signal> {
        if self.suppress_in_safe_mode && ctx.safe_mode {
            debug!(symbol = %self.symbol, "signal suppressed: safe mode");
            return None;
        }

        let outcome = self.rules.evaluate(candle, ctx);
        if outcome.passed.is_empty() {
            return None;
        }

        if let Some(last) = self.last_signal_price {
            if (candle.close - last).abs() < COOLDOWN_DISTANCE {
                debug!(
                    symbol = %self.symbol,
                    close = candle.close,
                    last_signal_price = last,
                    "signal suppressed: cooldown"
                );
                return None;
            }
        }

        let conviction = (CONVICTION_BASE + outcome.weight_sum).min(CONVICTION_MAX);
        let direction = if candle.is_bullish() {
            Direction::Buy
        } else {
            Direction::Sell
        };

        self.last_signal_price = Some(candle.close);

        Some(Signal {
            time: candle.timestamp,
            symbol: self.symbol.clone(),
            price: candle.close,
            direction,
            rules_passed: outcome.passed,
            rules_failed: outcome.failed,
            conviction,
            timeframe,
        })
    }
}
