//! Ticks, candles, and timeframes.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single market price update from the feed. Ephemeral: consumed by the
/// aggregator and never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub tradable: bool,
}

/// Candle interval. The aggregator keeps one open candle per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M1, Timeframe::M3, Timeframe::M5, Timeframe::M15];

    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
        }
    }

    pub fn parse(s: &str) -> Option<Timeframe> {
        match s {
            "1m" | "1" => Some(Timeframe::M1),
            "3m" | "3" => Some(Timeframe::M3),
            "5m" | "5" => Some(Timeframe::M5),
            "15m" | "15" => Some(Timeframe::M15),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// OHLC summary of one period. Invariant: high ≥ max(open, close) and
/// low ≤ min(open, close); open is the first tick of the period, close the
/// most recent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub period_start_minute: u32,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    /// Open a fresh candle from the first tick of a period.
    pub fn open_at(price: f64, timestamp: DateTime<Utc>) -> Self {
        Candle {
            open: price,
            high: price,
            low: price,
            close: price,
            period_start_minute: timestamp.minute(),
            timestamp,
        }
    }

    /// Fold another in-period tick into the candle.
    pub fn apply(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }

    /// |close - open|
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// high - low
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, min, sec).unwrap()
    }

    #[test]
    fn timeframe_minutes() {
        assert_eq!(Timeframe::M1.minutes(), 1);
        assert_eq!(Timeframe::M3.minutes(), 3);
        assert_eq!(Timeframe::M5.minutes(), 5);
        assert_eq!(Timeframe::M15.minutes(), 15);
    }

    #[test]
    fn timeframe_parse_roundtrip() {
        for tf in Timeframe::ALL {
            assert_eq!(Timeframe::parse(tf.label()), Some(tf));
        }
        assert_eq!(Timeframe::parse("2m"), None);
    }

    #[test]
    fn open_at_seeds_all_fields_from_price() {
        let c = Candle::open_at(100.0, ts(17, 3));
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 100.0);
        assert_eq!(c.low, 100.0);
        assert_eq!(c.close, 100.0);
        assert_eq!(c.period_start_minute, 17);
    }

    #[test]
    fn apply_updates_high_low_close() {
        let mut c = Candle::open_at(100.0, ts(17, 3));
        c.apply(108.0);
        c.apply(99.0);
        c.apply(107.0);
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 108.0);
        assert_eq!(c.low, 99.0);
        assert_eq!(c.close, 107.0);
    }

    #[test]
    fn body_and_range() {
        let mut c = Candle::open_at(100.0, ts(17, 3));
        c.apply(108.0);
        c.apply(99.0);
        c.apply(107.0);
        assert!((c.body() - 7.0).abs() < f64::EPSILON);
        assert!((c.range() - 9.0).abs() < f64::EPSILON);
        assert!(c.is_bullish());
    }

    #[test]
    fn flat_candle_is_not_bullish() {
        let c = Candle::open_at(100.0, ts(17, 3));
        assert!(!c.is_bullish());
    }
}
