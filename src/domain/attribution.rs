//! Rule attribution over persisted live signals.
//!
//! Unlike the backtest replay this evaluates signals that were actually
//! emitted, against a trailing window of 1-minute candles, and credits each
//! trade's outcome to every rule that passed on the signal.

use super::backtest::{ExitConfig, TradeOutcome, simulate_trade};
use super::candle::Candle;
use super::rule::RuleKind;
use super::signal::Signal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePerformance {
    pub rule: RuleKind,
    pub wins: usize,
    pub losses: usize,
}

impl RulePerformance {
    pub fn trades(&self) -> usize {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        let total = self.trades();
        if total == 0 {
            0.0
        } else {
            100.0 * self.wins as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPerformance {
    pub total_signals: usize,
    pub wins: usize,
    pub losses: usize,
    /// Per-rule breakdown, sorted by total trade count descending.
    pub rule_performance: Vec<RulePerformance>,
}

impl SignalPerformance {
    pub fn win_rate(&self) -> f64 {
        let total = self.wins + self.losses;
        if total == 0 {
            0.0
        } else {
            100.0 * self.wins as f64 / total as f64
        }
    }
}

/// Determine each signal's outcome against the candle window and attribute
/// it to the signal's passed rules. Signals with no candle after their
/// timestamp cannot be scored and are left out of the totals. The window
/// must be in ascending time order.
pub fn analyze_signals(
    signals: &[Signal],
    window: &[Candle],
    exits: &ExitConfig,
) -> SignalPerformance {
    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut scored = 0usize;
    let mut by_rule: HashMap<RuleKind, (usize, usize)> = HashMap::new();

    for signal in signals {
        let Some(first_after) = window.iter().position(|c| c.timestamp > signal.time) else {
            continue;
        };
        scored += 1;

        // entry sits just before the scan slice; simulate_trade walks
        // candles[index + 1..]
        let entry_index = first_after.saturating_sub(1);
        let trade = simulate_trade(window, entry_index, signal.direction, signal.price, exits);

        let won = trade.outcome == TradeOutcome::Win;
        if won {
            wins += 1;
        } else {
            losses += 1;
        }
        for &rule in &signal.rules_passed {
            let entry = by_rule.entry(rule).or_insert((0, 0));
            if won {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    let mut rule_performance: Vec<RulePerformance> = by_rule
        .into_iter()
        .map(|(rule, (wins, losses))| RulePerformance { rule, wins, losses })
        .collect();
    rule_performance.sort_by(|a, b| b.trades().cmp(&a.trades()).then(a.rule.name().cmp(b.rule.name())));

    SignalPerformance {
        total_signals: scored,
        wins,
        losses,
        rule_performance,
    }
}
