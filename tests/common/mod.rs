#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use std::cell::RefCell;
use std::sync::Mutex;

use tickforge::domain::candle::{Candle, Tick, Timeframe};
use tickforge::domain::error::TickforgeError;
use tickforge::domain::rule::RuleKind;
use tickforge::domain::signal::Signal;
use tickforge::ports::broker_port::{BrokerCredentials, BrokerPort};
use tickforge::ports::audit_port::AuditPort;
use tickforge::ports::event_port::{EngineEvent, EventPort};
use tickforge::ports::store_port::StorePort;

pub fn base_time() -> DateTime<Utc> {
    // a Monday, inside the default trading session
    Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
}

pub fn candle_at(minutes_after: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    let timestamp = base_time() + Duration::minutes(minutes_after);
    Candle {
        open,
        high,
        low,
        close,
        period_start_minute: timestamp.minute(),
        timestamp,
    }
}

pub fn tick_at(minute: u32, second: u32, price: f64) -> Tick {
    Tick {
        price,
        timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 10, minute, second).unwrap(),
        tradable: true,
    }
}

/// Broker serving a canned candle list, or a canned failure.
pub struct MockBroker {
    pub candles: Vec<Candle>,
    pub fail_with: Option<String>,
    pub fetch_count: Mutex<usize>,
}

impl MockBroker {
    pub fn with_candles(candles: Vec<Candle>) -> Self {
        MockBroker {
            candles,
            fail_with: None,
            fetch_count: Mutex::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        MockBroker {
            candles: Vec::new(),
            fail_with: Some(reason.to_string()),
            fetch_count: Mutex::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        *self.fetch_count.lock().unwrap()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, credentials: &BrokerCredentials) -> Result<(), TickforgeError> {
        if credentials.access_token == "rejected" {
            return Err(TickforgeError::Authentication {
                reason: "token rejected by broker".into(),
            });
        }
        Ok(())
    }

    fn fetch_candles(
        &self,
        _instrument: &str,
        _timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, TickforgeError> {
        *self.fetch_count.lock().unwrap() += 1;
        if let Some(reason) = &self.fail_with {
            return Err(TickforgeError::Feed {
                reason: reason.clone(),
            });
        }
        Ok(self
            .candles
            .iter()
            .filter(|c| c.timestamp >= from && c.timestamp <= to)
            .cloned()
            .collect())
    }
}

/// Event port that records everything published, in order.
#[derive(Default)]
pub struct RecordingBus {
    pub events: RefCell<Vec<EngineEvent>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        RecordingBus::default()
    }

    pub fn published(&self) -> Vec<EngineEvent> {
        self.events.borrow().clone()
    }
}

impl EventPort for RecordingBus {
    fn publish(&self, event: &EngineEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Audit port collecting signals in memory.
#[derive(Default)]
pub struct MemoryAudit {
    pub entries: Vec<Signal>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        MemoryAudit::default()
    }
}

impl AuditPort for MemoryAudit {
    fn append(&mut self, signal: &Signal) -> Result<(), TickforgeError> {
        self.entries.push(signal.clone());
        Ok(())
    }
}

/// Store whose writes always fail, for exercising the swallow-and-continue
/// path in the signal sink.
pub struct FailingStore;

impl StorePort for FailingStore {
    fn upsert_candles(
        &self,
        _instrument: &str,
        _timeframe: Timeframe,
        _candles: &[Candle],
    ) -> Result<usize, TickforgeError> {
        Err(TickforgeError::Persistence {
            reason: "disk full".into(),
        })
    }

    fn candles_in_range(
        &self,
        _instrument: &str,
        _timeframe: Timeframe,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, TickforgeError> {
        Err(TickforgeError::Persistence {
            reason: "disk full".into(),
        })
    }

    fn append_signal(&self, _signal: &Signal) -> Result<(), TickforgeError> {
        Err(TickforgeError::Persistence {
            reason: "disk full".into(),
        })
    }

    fn signals_since(&self, _from: DateTime<Utc>) -> Result<Vec<Signal>, TickforgeError> {
        Err(TickforgeError::Persistence {
            reason: "disk full".into(),
        })
    }

    fn save_rule_weights(&self, _weights: &[(RuleKind, u32)]) -> Result<(), TickforgeError> {
        Err(TickforgeError::Persistence {
            reason: "disk full".into(),
        })
    }

    fn load_rule_weights(&self) -> Result<Vec<(RuleKind, u32)>, TickforgeError> {
        Err(TickforgeError::Persistence {
            reason: "disk full".into(),
        })
    }
}
