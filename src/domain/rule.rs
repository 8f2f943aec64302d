//! Trading rules and their evaluation.
//!
//! Rules are a tagged enum rather than a name-keyed table, so adding or
//! removing one never touches aggregation or scoring. Each rule is a pure
//! predicate over (candle, context).

use super::candle::Candle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_RULE_WEIGHT: u32 = 5;

/// Body size must exceed this share of the total range for
/// `BodyDominance` to pass.
pub const BODY_DOMINANCE_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Candle closed beyond the previous-period high (or low) while having
    /// opened at or inside it.
    PrevLevelBreak,
    /// Body size / total range > [`BODY_DOMINANCE_RATIO`].
    BodyDominance,
}

impl RuleKind {
    pub const ALL: [RuleKind; 2] = [RuleKind::PrevLevelBreak, RuleKind::BodyDominance];

    pub fn name(self) -> &'static str {
        match self {
            RuleKind::PrevLevelBreak => "prev_level_break",
            RuleKind::BodyDominance => "body_dominance",
        }
    }

    pub fn parse(s: &str) -> Option<RuleKind> {
        match s {
            "prev_level_break" => Some(RuleKind::PrevLevelBreak),
            "body_dominance" => Some(RuleKind::BodyDominance),
            _ => None,
        }
    }

    pub fn evaluate(self, candle: &Candle, ctx: &RuleContext) -> bool {
        match self {
            RuleKind::PrevLevelBreak => {
                let broke_high =
                    candle.close > ctx.levels.prev_high && candle.open <= ctx.levels.prev_high;
                let broke_low =
                    candle.close < ctx.levels.prev_low && candle.open >= ctx.levels.prev_low;
                broke_high || broke_low
            }
            RuleKind::BodyDominance => {
                let range = candle.range();
                range > 0.0 && candle.body() / range > BODY_DOMINANCE_RATIO
            }
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reference levels a closed candle is judged against. Live evaluation uses
/// the previous trading session's high/low; the backtest replay substitutes
/// the immediately preceding candle's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceLevels {
    pub prev_high: f64,
    pub prev_low: f64,
}

/// Per-evaluation context. `safe_mode` mirrors the shared
/// [`RiskContext`](super::risk::RiskContext) flag at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleContext {
    pub levels: ReferenceLevels,
    pub safe_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDescriptor {
    pub kind: RuleKind,
    pub weight: u32,
}

/// The ordered rule table with per-rule weights.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<RuleDescriptor>,
}

impl Default for RuleSet {
    fn default() -> Self {
        RuleSet {
            rules: RuleKind::ALL
                .iter()
                .map(|&kind| RuleDescriptor {
                    kind,
                    weight: DEFAULT_RULE_WEIGHT,
                })
                .collect(),
        }
    }
}

impl RuleSet {
    /// Default table with stored weight overrides applied. Unknown kinds in
    /// `overrides` are simply absent from the default table and ignored.
    pub fn with_weights(overrides: &HashMap<RuleKind, u32>) -> Self {
        let mut set = RuleSet::default();
        for rule in &mut set.rules {
            if let Some(&weight) = overrides.get(&rule.kind) {
                rule.weight = weight;
            }
        }
        set
    }

    pub fn weight(&self, kind: RuleKind) -> u32 {
        self.rules
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| r.weight)
            .unwrap_or(DEFAULT_RULE_WEIGHT)
    }

    pub fn descriptors(&self) -> &[RuleDescriptor] {
        &self.rules
    }

    /// Evaluate every rule, splitting the table into passed and failed and
    /// summing the passed weights.
    pub fn evaluate(&self, candle: &Candle, ctx: &RuleContext) -> RuleOutcome {
        let mut outcome = RuleOutcome {
            passed: Vec::new(),
            failed: Vec::new(),
            weight_sum: 0,
        };
        for rule in &self.rules {
            if rule.kind.evaluate(candle, ctx) {
                outcome.passed.push(rule.kind);
                outcome.weight_sum += rule.weight;
            } else {
                outcome.failed.push(rule.kind);
            }
        }
        outcome
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub passed: Vec<RuleKind>,
    pub failed: Vec<RuleKind>,
    pub weight_sum: u32,
}
