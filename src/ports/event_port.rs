//! Publish/subscribe event port.
//!
//! Fire-and-forget, at-most-once: slow or disconnected subscribers simply
//! miss events. No backpressure, no redelivery.

use crate::domain::feed::ConnectionState;
use crate::domain::market_hours::MarketStatus;
use crate::domain::signal::Signal;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Signal(Signal),
    TickRelay { price: f64, time: DateTime<Utc> },
    MarketStatus { status: MarketStatus },
    ConnectionStatus { state: ConnectionState },
    Sentiment { score: f64 },
}

pub trait EventPort {
    fn publish(&self, event: &EngineEvent);
}
