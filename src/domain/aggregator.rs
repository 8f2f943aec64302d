//! Candle aggregation state machine.
//!
//! One open candle per configured timeframe, mutated in place while its
//! period runs and replaced the instant a new period begins. Must only be
//! driven from the single tick-processing context.

use super::candle::{Candle, Tick, Timeframe};
use chrono::Timelike;

/// A candle handed downstream exactly once, at the period boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedCandle {
    pub timeframe: Timeframe,
    pub candle: Candle,
}

struct Slot {
    timeframe: Timeframe,
    open: Option<Candle>,
}

pub struct CandleAggregator {
    slots: Vec<Slot>,
    current_price: Option<f64>,
}

impl CandleAggregator {
    pub fn new(timeframes: &[Timeframe]) -> Self {
        CandleAggregator {
            slots: timeframes
                .iter()
                .map(|&timeframe| Slot {
                    timeframe,
                    open: None,
                })
                .collect(),
            current_price: None,
        }
    }

    /// Last tradable price seen, updated on every tick regardless of
    /// market-hours state. Relayed to subscribers for display.
    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    /// Feed one tick through every timeframe slot.
    ///
    /// Non-tradable or malformed (non-finite price) ticks are dropped
    /// silently. A minute change is a period boundary: the outgoing candle
    /// is emitted as closed only when the new minute lands on the
    /// timeframe's interval, and a fresh candle always opens at the
    /// boundary. Returns at most one closed candle per timeframe.
    pub fn on_tick(&mut self, tick: &Tick) -> Vec<ClosedCandle> {
        if !tick.tradable || !tick.price.is_finite() {
            return Vec::new();
        }
        self.current_price = Some(tick.price);

        let minute = tick.timestamp.minute();
        let mut closed = Vec::new();

        for slot in &mut self.slots {
            match &mut slot.open {
                Some(candle) if candle.period_start_minute == minute => {
                    candle.apply(tick.price);
                }
                open => {
                    if let Some(previous) = open.take() {
                        if minute % slot.timeframe.minutes() == 0 {
                            closed.push(ClosedCandle {
                                timeframe: slot.timeframe,
                                candle: previous,
                            });
                        }
                    }
                    *open = Some(Candle::open_at(tick.price, tick.timestamp));
                }
            }
        }

        closed
    }
}
