//! CSV file broker adapter.
//!
//! Serves historical candles from local CSV files, one file per
//! instrument/timeframe pair, for offline backtesting and replay. Also
//! reads recorded tick files for the replay command.

use crate::domain::candle::{Candle, Tick, Timeframe};
use crate::domain::error::TickforgeError;
use crate::ports::broker_port::{BrokerCredentials, BrokerPort};
use chrono::{DateTime, Timelike, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvBrokerAdapter {
    base_path: PathBuf,
    connected: bool,
}

impl CsvBrokerAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn csv_path(&self, instrument: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument, timeframe.label()))
    }
}

fn parse_field_f64(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, TickforgeError> {
    record
        .get(index)
        .ok_or_else(|| TickforgeError::Feed {
            reason: format!("missing {name} column"),
        })?
        .parse()
        .map_err(|e| TickforgeError::Feed {
            reason: format!("invalid {name} value: {e}"),
        })
}

fn parse_field_time(
    record: &csv::StringRecord,
    index: usize,
) -> Result<DateTime<Utc>, TickforgeError> {
    let raw = record.get(index).ok_or_else(|| TickforgeError::Feed {
        reason: "missing timestamp column".into(),
    })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TickforgeError::Feed {
            reason: format!("invalid timestamp '{raw}': {e}"),
        })
}

impl BrokerPort for CsvBrokerAdapter {
    fn connect(&mut self, credentials: &BrokerCredentials) -> Result<(), TickforgeError> {
        // local files need no session, but mirror the broker contract:
        // a blank token is what an expired login looks like upstream
        if credentials.api_key.is_empty() || credentials.access_token.is_empty() {
            return Err(TickforgeError::Authentication {
                reason: "empty api_key or access_token".into(),
            });
        }
        self.connected = true;
        Ok(())
    }

    fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, TickforgeError> {
        let path = self.csv_path(instrument, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| TickforgeError::Feed {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TickforgeError::Feed {
                reason: format!("CSV parse error: {e}"),
            })?;

            let timestamp = parse_field_time(&record, 0)?;
            if timestamp < from || timestamp > to {
                continue;
            }

            let open = parse_field_f64(&record, 1, "open")?;
            let high = parse_field_f64(&record, 2, "high")?;
            let low = parse_field_f64(&record, 3, "low")?;
            let close = parse_field_f64(&record, 4, "close")?;

            candles.push(Candle {
                open,
                high,
                low,
                close,
                period_start_minute: timestamp.minute(),
                timestamp,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

/// Read a recorded tick file: timestamp,price,tradable per row, header
/// included.
pub fn read_ticks<P: AsRef<Path>>(path: P) -> Result<Vec<Tick>, TickforgeError> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| TickforgeError::Feed {
        reason: format!("failed to read {}: {}", path.as_ref().display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut ticks = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| TickforgeError::Feed {
            reason: format!("CSV parse error: {e}"),
        })?;

        let timestamp = parse_field_time(&record, 0)?;
        let price = parse_field_f64(&record, 1, "price")?;
        let tradable = record
            .get(2)
            .map(|v| matches!(v.trim(), "true" | "1" | "yes"))
            .unwrap_or(true);

        ticks.push(Tick {
            price,
            timestamp,
            tradable,
        });
    }

    Ok(ticks)
}
