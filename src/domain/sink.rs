//! Signal side effects and rolling sentiment.

use super::signal::{Direction, Signal};
use crate::ports::audit_port::AuditPort;
use crate::ports::event_port::{EngineEvent, EventPort};
use crate::ports::store_port::StorePort;
use std::collections::VecDeque;
use tracing::{info, warn};

/// Number of recent signals the sentiment score looks at.
pub const SENTIMENT_WINDOW: usize = 20;

/// Score reported while no signals have been seen yet.
pub const NEUTRAL_SENTIMENT: f64 = 50.0;

/// Bounded buffer of recent signal directions. Sentiment is the share of
/// BUYs in the buffer, scaled to [0, 100].
#[derive(Debug, Clone)]
pub struct SentimentTracker {
    recent: VecDeque<Direction>,
}

impl Default for SentimentTracker {
    fn default() -> Self {
        SentimentTracker {
            recent: VecDeque::with_capacity(SENTIMENT_WINDOW),
        }
    }
}

impl SentimentTracker {
    pub fn new() -> Self {
        SentimentTracker::default()
    }

    pub fn push(&mut self, direction: Direction) {
        if self.recent.len() == SENTIMENT_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(direction);
    }

    pub fn score(&self) -> f64 {
        if self.recent.is_empty() {
            return NEUTRAL_SENTIMENT;
        }
        let buys = self
            .recent
            .iter()
            .filter(|d| **d == Direction::Buy)
            .count();
        100.0 * buys as f64 / self.recent.len() as f64
    }
}

/// Runs a signal's side effects in their fixed order: sentiment update,
/// persist, audit, publish signal, publish sentiment.
///
/// Persistence and audit failures are logged and swallowed: a signal
/// already computed must still reach subscribers.
pub struct SignalSink<'a> {
    store: &'a dyn StorePort,
    audit: &'a mut dyn AuditPort,
    events: &'a dyn EventPort,
    sentiment: SentimentTracker,
}

impl<'a> SignalSink<'a> {
    pub fn new(
        store: &'a dyn StorePort,
        audit: &'a mut dyn AuditPort,
        events: &'a dyn EventPort,
    ) -> Self {
        SignalSink {
            store,
            audit,
            events,
            sentiment: SentimentTracker::new(),
        }
    }

    pub fn sentiment_score(&self) -> f64 {
        self.sentiment.score()
    }

    pub fn accept(&mut self, signal: &Signal) {
        self.sentiment.push(signal.direction);

        if let Err(e) = self.store.append_signal(signal) {
            warn!(error = %e, "failed to persist signal; continuing");
        }
        if let Err(e) = self.audit.append(signal) {
            warn!(error = %e, "failed to append signal to audit log; continuing");
        }

        info!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            price = signal.price,
            conviction = signal.conviction,
            timeframe = %signal.timeframe,
            "signal emitted"
        );

        self.events.publish(&EngineEvent::Signal(signal.clone()));
        self.events.publish(&EngineEvent::Sentiment {
            score: self.sentiment.score(),
        });
    }
}
