//! Live pipeline integration tests.
//!
//! Covers:
//! - tick -> aggregator -> rule engine -> sink with real side-effect order
//! - market-hours gating (relay continues, evaluation pauses)
//! - persistence failure never blocks publishing
//! - market status and connection transitions republished as events

mod common;

use common::*;
use chrono::{TimeZone, Utc};
use tickforge::adapters::sqlite_adapter::SqliteStoreAdapter;
use tickforge::domain::candle::{Tick, Timeframe};
use tickforge::domain::feed::ConnectionState;
use tickforge::domain::live::LiveEngine;
use tickforge::domain::market_hours::{MarketHours, MarketStatus, SessionWindow};
use tickforge::domain::risk::RiskContext;
use tickforge::domain::rule::{ReferenceLevels, RuleSet};
use tickforge::domain::signal::{Direction, SignalEngine};
use tickforge::domain::sink::SignalSink;
use tickforge::ports::event_port::EngineEvent;
use tickforge::ports::store_port::StorePort;

fn levels() -> ReferenceLevels {
    ReferenceLevels {
        prev_high: 48_040.0,
        prev_low: 47_800.0,
    }
}

/// Ticks that build one 1m candle breaking the previous-session high with a
/// dominant body, then a boundary tick that closes it.
fn breakout_ticks() -> Vec<Tick> {
    vec![
        tick_at(14, 0, 48_000.0),
        tick_at(14, 20, 48_150.0),
        tick_at(14, 40, 47_990.0),
        tick_at(14, 50, 48_140.0),
        tick_at(15, 0, 48_141.0),
    ]
}

#[test]
fn breakout_tick_stream_emits_one_signal() {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()),
        MarketHours::new(SessionWindow::default()),
        levels(),
        RiskContext::new(),
        sink,
        &bus,
    );

    for tick in breakout_ticks() {
        engine.on_timer(tick.timestamp);
        engine.on_tick(&tick);
    }

    assert_eq!(engine.signals_emitted(), 1);
    assert_eq!(engine.current_price(), Some(48_141.0));

    // the closed candle: open 48000, high 48150, low 47990, close 48140
    // breaks prev high 48040 with body 140 / range 160
    let events = bus.published();
    let signal_event = events.iter().find_map(|e| match e {
        EngineEvent::Signal(s) => Some(s.clone()),
        _ => None,
    });
    let signal = signal_event.expect("signal event published");
    assert_eq!(signal.direction, Direction::Buy);
    assert_eq!(signal.price, 48_140.0);
    assert_eq!(signal.conviction, 60);

    // persisted and audited
    let stored = store
        .signals_since(Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap())
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], signal);
    assert_eq!(audit.entries, vec![signal]);
}

#[test]
fn side_effect_order_is_fixed() {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()),
        MarketHours::new(SessionWindow::default()),
        levels(),
        RiskContext::new(),
        sink,
        &bus,
    );

    for tick in breakout_ticks() {
        engine.on_timer(tick.timestamp);
        engine.on_tick(&tick);
    }

    // the market-open transition comes first, then tick relays; the signal
    // is immediately followed by its sentiment update
    let events = bus.published();
    assert!(matches!(
        events[0],
        EngineEvent::MarketStatus {
            status: MarketStatus::Open
        }
    ));

    let signal_pos = events
        .iter()
        .position(|e| matches!(e, EngineEvent::Signal(_)))
        .expect("signal published");
    match &events[signal_pos + 1] {
        EngineEvent::Sentiment { score } => {
            // single BUY in the buffer
            assert!((score - 100.0).abs() < f64::EPSILON);
        }
        other => panic!("expected sentiment after signal, got {other:?}"),
    }
}

#[test]
fn closed_market_relays_price_but_suppresses_signals() {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()),
        MarketHours::new(SessionWindow::default()),
        levels(),
        RiskContext::new(),
        sink,
        &bus,
    );

    // never poll the timer into the session: market stays CLOSED
    for tick in breakout_ticks() {
        engine.on_tick(&tick);
    }

    assert_eq!(engine.signals_emitted(), 0);
    assert_eq!(engine.current_price(), Some(48_141.0));

    let events = bus.published();
    let relays = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::TickRelay { .. }))
        .count();
    assert_eq!(relays, 5);
    assert!(!events.iter().any(|e| matches!(e, EngineEvent::Signal(_))));
}

#[test]
fn persistence_failure_does_not_block_publishing() {
    let store = FailingStore;
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()),
        MarketHours::new(SessionWindow::default()),
        levels(),
        RiskContext::new(),
        sink,
        &bus,
    );

    for tick in breakout_ticks() {
        engine.on_timer(tick.timestamp);
        engine.on_tick(&tick);
    }

    // the store rejected the write, but subscribers still saw the signal
    assert_eq!(engine.signals_emitted(), 1);
    let events = bus.published();
    assert!(events.iter().any(|e| matches!(e, EngineEvent::Signal(_))));
    assert_eq!(audit.entries.len(), 1);
}

#[test]
fn safe_mode_suppression_when_opted_in() {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let risk = RiskContext::new();
    risk.set_safe_mode(true);

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()).suppress_in_safe_mode(true),
        MarketHours::new(SessionWindow::default()),
        levels(),
        risk,
        sink,
        &bus,
    );

    for tick in breakout_ticks() {
        engine.on_timer(tick.timestamp);
        engine.on_tick(&tick);
    }

    assert_eq!(engine.signals_emitted(), 0);
}

#[test]
fn market_transitions_are_broadcast() {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let mut engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()),
        MarketHours::new(SessionWindow::default()),
        levels(),
        RiskContext::new(),
        sink,
        &bus,
    );

    engine.on_timer(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap());
    engine.on_timer(Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap());
    engine.on_timer(Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap());
    engine.on_timer(Utc.with_ymd_and_hms(2024, 6, 3, 16, 0, 0).unwrap());

    let events = bus.published();
    assert_eq!(
        events,
        vec![
            EngineEvent::MarketStatus {
                status: MarketStatus::Open
            },
            EngineEvent::MarketStatus {
                status: MarketStatus::Closed
            },
        ]
    );
}

#[test]
fn connection_transitions_are_republished() {
    let store = SqliteStoreAdapter::in_memory().unwrap();
    let mut audit = MemoryAudit::new();
    let bus = RecordingBus::new();

    let sink = SignalSink::new(&store, &mut audit, &bus);
    let engine = LiveEngine::new(
        &[Timeframe::M1],
        SignalEngine::new("BANKNIFTY", RuleSet::default()),
        MarketHours::new(SessionWindow::default()),
        levels(),
        RiskContext::new(),
        sink,
        &bus,
    );

    engine.on_connection_event(ConnectionState::Connecting);
    engine.on_connection_event(ConnectionState::Connected);
    engine.on_connection_event(ConnectionState::Reconnecting);

    let events = bus.published();
    assert_eq!(
        events,
        vec![
            EngineEvent::ConnectionStatus {
                state: ConnectionState::Connecting
            },
            EngineEvent::ConnectionStatus {
                state: ConnectionState::Connected
            },
            EngineEvent::ConnectionStatus {
                state: ConnectionState::Reconnecting
            },
        ]
    );
}
