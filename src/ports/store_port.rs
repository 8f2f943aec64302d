//! Durable store port trait.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::TickforgeError;
use crate::domain::rule::RuleKind;
use crate::domain::signal::Signal;
use chrono::{DateTime, Utc};

pub trait StorePort {
    /// Insert candles in one transaction, skipping rows that already exist
    /// for (instrument, timeframe, timestamp). Returns the number of rows
    /// actually inserted. A failure rolls back this batch only.
    fn upsert_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<usize, TickforgeError>;

    /// All cached candles in the range, ascending by timestamp.
    fn candles_in_range(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, TickforgeError>;

    /// Append-only write of an emitted signal.
    fn append_signal(&self, signal: &Signal) -> Result<(), TickforgeError>;

    /// Persisted signals at or after `from`, ascending by time.
    fn signals_since(&self, from: DateTime<Utc>) -> Result<Vec<Signal>, TickforgeError>;

    /// Replace the stored rule-weight configuration.
    fn save_rule_weights(&self, weights: &[(RuleKind, u32)]) -> Result<(), TickforgeError>;

    fn load_rule_weights(&self) -> Result<Vec<(RuleKind, u32)>, TickforgeError>;
}
