//! Configuration validation.
//!
//! Validates config fields before any broker call or backtest run.

use crate::domain::error::TickforgeError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveTime;

pub fn validate_instrument_config(config: &dyn ConfigPort) -> Result<(), TickforgeError> {
    match config.get_string("instrument", "symbol") {
        Some(symbol) if !symbol.trim().is_empty() => Ok(()),
        Some(_) => Err(TickforgeError::ConfigInvalid {
            section: "instrument".to_string(),
            key: "symbol".to_string(),
            reason: "symbol must not be empty".to_string(),
        }),
        None => Err(TickforgeError::ConfigMissing {
            section: "instrument".to_string(),
            key: "symbol".to_string(),
        }),
    }
}

/// Broker credentials are rejected here, synchronously, before any network
/// call is attempted.
pub fn validate_broker_config(config: &dyn ConfigPort) -> Result<(), TickforgeError> {
    for key in ["api_key", "access_token"] {
        match config.get_string("broker", key) {
            Some(value) if !value.trim().is_empty() => {}
            Some(_) => {
                return Err(TickforgeError::ConfigInvalid {
                    section: "broker".to_string(),
                    key: key.to_string(),
                    reason: format!("{key} must not be empty"),
                });
            }
            None => {
                return Err(TickforgeError::ConfigMissing {
                    section: "broker".to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TickforgeError> {
    validate_exit_pct(config, "stop_pct")?;
    validate_exit_pct(config, "target_pct")?;
    validate_timeframe(config)?;
    Ok(())
}

pub fn validate_session_config(config: &dyn ConfigPort) -> Result<(), TickforgeError> {
    let opens = parse_session_time(config, "opens")?;
    let closes = parse_session_time(config, "closes")?;
    match (opens, closes) {
        (Some(o), Some(c)) if o >= c => Err(TickforgeError::ConfigInvalid {
            section: "session".to_string(),
            key: "opens".to_string(),
            reason: "opens must be before closes".to_string(),
        }),
        _ => Ok(()),
    }
}

fn validate_exit_pct(config: &dyn ConfigPort, key: &str) -> Result<(), TickforgeError> {
    let value = config.get_double("backtest", key, 1.0);
    if value <= 0.0 {
        return Err(TickforgeError::ConfigInvalid {
            section: "backtest".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be positive"),
        });
    }
    Ok(())
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), TickforgeError> {
    use crate::domain::candle::Timeframe;
    if let Some(label) = config.get_string("backtest", "timeframe") {
        if Timeframe::parse(&label).is_none() {
            return Err(TickforgeError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "timeframe".to_string(),
                reason: format!("unknown timeframe '{label}' (expected 1m, 3m, 5m or 15m)"),
            });
        }
    }
    Ok(())
}

fn parse_session_time(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<NaiveTime>, TickforgeError> {
    match config.get_string("session", key) {
        None => Ok(None),
        Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
            .map(Some)
            .map_err(|e| TickforgeError::ConfigInvalid {
                section: "session".to_string(),
                key: key.to_string(),
                reason: format!("expected HH:MM: {e}"),
            }),
    }
}
