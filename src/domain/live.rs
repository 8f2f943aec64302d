//! Live tick pipeline: aggregation, gating, evaluation, side effects.
//!
//! Strictly single-threaded with respect to tick ordering; candle state is
//! mutated in place and must never see concurrent ticks.

use super::aggregator::CandleAggregator;
use super::candle::{Tick, Timeframe};
use super::feed::ConnectionState;
use super::market_hours::{MarketHours, MarketStatus};
use super::risk::RiskContext;
use super::rule::{ReferenceLevels, RuleContext};
use super::signal::SignalEngine;
use super::sink::SignalSink;
use crate::ports::event_port::{EngineEvent, EventPort};
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct LiveEngine<'a> {
    aggregator: CandleAggregator,
    signal_engine: SignalEngine,
    market_hours: MarketHours,
    /// Previous trading session's high/low, fetched once per connection.
    levels: ReferenceLevels,
    risk: RiskContext,
    sink: SignalSink<'a>,
    events: &'a dyn EventPort,
    signals_emitted: usize,
}

impl<'a> LiveEngine<'a> {
    pub fn new(
        timeframes: &[Timeframe],
        signal_engine: SignalEngine,
        market_hours: MarketHours,
        levels: ReferenceLevels,
        risk: RiskContext,
        sink: SignalSink<'a>,
        events: &'a dyn EventPort,
    ) -> Self {
        LiveEngine {
            aggregator: CandleAggregator::new(timeframes),
            signal_engine,
            market_hours,
            levels,
            risk,
            sink,
            events,
            signals_emitted: 0,
        }
    }

    pub fn signals_emitted(&self) -> usize {
        self.signals_emitted
    }

    pub fn current_price(&self) -> Option<f64> {
        self.aggregator.current_price()
    }

    /// Process one tick in arrival order. The price is relayed to
    /// subscribers even while the market is closed; rule evaluation only
    /// runs while it is open.
    pub fn on_tick(&mut self, tick: &Tick) {
        let closed = self.aggregator.on_tick(tick);
        if tick.tradable && tick.price.is_finite() {
            self.events.publish(&EngineEvent::TickRelay {
                price: tick.price,
                time: tick.timestamp,
            });
        }

        if self.market_hours.status() == MarketStatus::Closed {
            if !closed.is_empty() {
                debug!("market closed; skipping rule evaluation");
            }
            return;
        }

        for closed_candle in closed {
            let ctx = RuleContext {
                levels: self.levels,
                safe_mode: self.risk.is_safe_mode(),
            };
            if let Some(signal) =
                self.signal_engine
                    .evaluate(&closed_candle.candle, closed_candle.timeframe, &ctx)
            {
                self.signals_emitted += 1;
                self.sink.accept(&signal);
            }
        }
    }

    /// Fixed-timer callback: re-derive market status and broadcast a
    /// transition if one occurred.
    pub fn on_timer(&mut self, now: DateTime<Utc>) {
        if let Some(status) = self.market_hours.poll(now) {
            self.events.publish(&EngineEvent::MarketStatus { status });
        }
    }

    /// Republish a feed connection transition. The feed owns the actual
    /// reconnect/backoff policy.
    pub fn on_connection_event(&self, state: ConnectionState) {
        self.events.publish(&EngineEvent::ConnectionStatus { state });
    }
}
