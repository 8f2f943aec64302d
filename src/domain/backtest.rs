//! Backtest replay and trade outcome simulation.

use super::candle::{Candle, Timeframe};
use super::metrics::PerformanceMetrics;
use super::rule::{ReferenceLevels, RuleContext, RuleSet};
use super::signal::{Direction, Signal, SignalEngine};
use serde::Serialize;

pub const BACKTEST_NOTIONAL: f64 = 100_000.0;
pub const DEFAULT_STOP_PCT: f64 = 0.5;
pub const DEFAULT_TARGET_PCT: f64 = 1.0;

/// Stop-loss and take-profit offsets as percentages of the entry price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitConfig {
    pub stop_pct: f64,
    pub target_pct: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        ExitConfig {
            stop_pct: DEFAULT_STOP_PCT,
            target_pct: DEFAULT_TARGET_PCT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
}

/// One simulated trade, consumed once by metrics aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestTrade {
    pub candle_index: usize,
    pub entry_price: f64,
    pub direction: Direction,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub exit_price: f64,
    pub outcome: TradeOutcome,
}

impl BacktestTrade {
    /// Direction-aware fractional return of the trade.
    pub fn trade_return(&self) -> f64 {
        match self.direction {
            Direction::Buy => (self.exit_price - self.entry_price) / self.entry_price,
            Direction::Sell => (self.entry_price - self.exit_price) / self.entry_price,
        }
    }
}

/// A replay signal tagged with the candle it fired on.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSignal {
    pub candle_index: usize,
    pub signal: Signal,
}

#[derive(Debug)]
pub struct BacktestResult {
    pub signals: Vec<IndexedSignal>,
    pub trades: Vec<BacktestTrade>,
    pub metrics: PerformanceMetrics,
}

/// Replay a candle series through a fresh rule evaluation pass.
///
/// Reference levels are the immediately preceding candle's high/low, a
/// deliberate simplification of the live path, which uses the previous
/// trading session's levels. Cooldown state carries across the whole
/// replay, as it does live.
pub fn run_replay(
    candles: &[Candle],
    engine: &mut SignalEngine,
    timeframe: Timeframe,
) -> Vec<IndexedSignal> {
    let mut signals = Vec::new();
    for index in 1..candles.len() {
        let prev = &candles[index - 1];
        let ctx = RuleContext {
            levels: ReferenceLevels {
                prev_high: prev.high,
                prev_low: prev.low,
            },
            safe_mode: false,
        };
        if let Some(signal) = engine.evaluate(&candles[index], timeframe, &ctx) {
            signals.push(IndexedSignal {
                candle_index: index,
                signal,
            });
        }
    }
    signals
}

/// Walk forward from the entry candle until stop or target is touched.
///
/// The target is checked before the stop within the same candle, so a
/// candle touching both counts as a win. A trade still open at the end of
/// the series exits at the final close and is classified by comparing exit
/// to entry in the trade's direction.
pub fn simulate_trade(
    candles: &[Candle],
    candle_index: usize,
    direction: Direction,
    entry_price: f64,
    exits: &ExitConfig,
) -> BacktestTrade {
    let (stop_loss_price, take_profit_price) = match direction {
        Direction::Buy => (
            entry_price * (1.0 - exits.stop_pct / 100.0),
            entry_price * (1.0 + exits.target_pct / 100.0),
        ),
        Direction::Sell => (
            entry_price * (1.0 + exits.stop_pct / 100.0),
            entry_price * (1.0 - exits.target_pct / 100.0),
        ),
    };

    let mut trade = BacktestTrade {
        candle_index,
        entry_price,
        direction,
        stop_loss_price,
        take_profit_price,
        exit_price: entry_price,
        outcome: TradeOutcome::Loss,
    };

    for candle in &candles[candle_index + 1..] {
        match direction {
            Direction::Buy => {
                if candle.high >= take_profit_price {
                    trade.exit_price = take_profit_price;
                    trade.outcome = TradeOutcome::Win;
                    return trade;
                }
                if candle.low <= stop_loss_price {
                    trade.exit_price = stop_loss_price;
                    trade.outcome = TradeOutcome::Loss;
                    return trade;
                }
            }
            Direction::Sell => {
                if candle.low <= take_profit_price {
                    trade.exit_price = take_profit_price;
                    trade.outcome = TradeOutcome::Win;
                    return trade;
                }
                if candle.high >= stop_loss_price {
                    trade.exit_price = stop_loss_price;
                    trade.outcome = TradeOutcome::Loss;
                    return trade;
                }
            }
        }
    }

    // series ended with neither level touched
    if let Some(last) = candles.last() {
        trade.exit_price = last.close;
    }
    let favourable = match direction {
        Direction::Buy => trade.exit_price > entry_price,
        Direction::Sell => trade.exit_price < entry_price,
    };
    trade.outcome = if favourable {
        TradeOutcome::Win
    } else {
        TradeOutcome::Loss
    };
    trade
}

/// Full backtest: replay, simulate every signal's trade, accumulate
/// metrics in signal order. Deterministic for identical inputs.
pub fn run_backtest(
    candles: &[Candle],
    symbol: &str,
    timeframe: Timeframe,
    rules: RuleSet,
    exits: &ExitConfig,
) -> BacktestResult {
    let mut engine = SignalEngine::new(symbol, rules);
    let signals = run_replay(candles, &mut engine, timeframe);

    let mut metrics = PerformanceMetrics::new(BACKTEST_NOTIONAL);
    let mut trades = Vec::with_capacity(signals.len());
    for indexed in &signals {
        let trade = simulate_trade(
            candles,
            indexed.candle_index,
            indexed.signal.direction,
            indexed.signal.price,
            exits,
        );
        metrics.record(trade.trade_return());
        trades.push(trade);
    }

    BacktestResult {
        signals,
        trades,
        metrics,
    }
}
