//! SQLite store adapter.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::TickforgeError;
use crate::domain::rule::RuleKind;
use crate::domain::signal::{Direction, Signal};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::warn;

#[derive(Debug)]
pub struct SqliteStoreAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStoreAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TickforgeError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TickforgeError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| TickforgeError::Persistence {
                    reason: e.to_string(),
                })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TickforgeError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn initialize_schema(&self) -> Result<(), TickforgeError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candles (
                instrument TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                period_start_minute INTEGER NOT NULL,
                PRIMARY KEY (instrument, timeframe, timestamp)
            );
            CREATE TABLE IF NOT EXISTS signals (
                time TEXT NOT NULL,
                symbol TEXT NOT NULL,
                price REAL NOT NULL,
                direction TEXT NOT NULL,
                rules_passed TEXT NOT NULL,
                rules_failed TEXT NOT NULL,
                conviction INTEGER NOT NULL,
                timeframe TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_time ON signals(time);
            CREATE TABLE IF NOT EXISTS rule_weights (
                rule TEXT PRIMARY KEY,
                weight INTEGER NOT NULL
            );",
        )
        .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, TickforgeError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, TickforgeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TickforgeError::Persistence {
            reason: format!("invalid stored timestamp '{raw}': {e}"),
        })
}

fn parse_timeframe(raw: &str) -> Result<Timeframe, TickforgeError> {
    Timeframe::parse(raw).ok_or_else(|| TickforgeError::Persistence {
        reason: format!("invalid stored timeframe '{raw}'"),
    })
}

fn parse_direction(raw: &str) -> Result<Direction, TickforgeError> {
    match raw {
        "BUY" => Ok(Direction::Buy),
        "SELL" => Ok(Direction::Sell),
        other => Err(TickforgeError::Persistence {
            reason: format!("invalid stored direction '{other}'"),
        }),
    }
}

fn parse_rules(raw: &str) -> Result<Vec<RuleKind>, TickforgeError> {
    serde_json::from_str(raw).map_err(|e| TickforgeError::Persistence {
        reason: format!("invalid stored rule list '{raw}': {e}"),
    })
}

impl StorePort for SqliteStoreAdapter {
    fn upsert_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<usize, TickforgeError> {
        let mut conn = self.conn()?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let mut inserted = 0usize;
        for candle in candles {
            let changed = tx
                .execute(
                    "INSERT OR IGNORE INTO candles
                     (instrument, timeframe, timestamp, open, high, low, close, period_start_minute)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        instrument,
                        timeframe.label(),
                        candle.timestamp.to_rfc3339(),
                        candle.open,
                        candle.high,
                        candle.low,
                        candle.close,
                        candle.period_start_minute,
                    ],
                )
                .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                    reason: e.to_string(),
                })?;
            inserted += changed;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        Ok(inserted)
    }

    fn candles_in_range(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, TickforgeError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, period_start_minute
                 FROM candles
                 WHERE instrument = ?1 AND timeframe = ?2 AND timestamp >= ?3 AND timestamp <= ?4
                 ORDER BY timestamp ASC",
            )
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(
                params![
                    instrument,
                    timeframe.label(),
                    from.to_rfc3339(),
                    to.to_rfc3339()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, u32>(5)?,
                    ))
                },
            )
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let mut candles = Vec::new();
        for row in rows {
            let (timestamp, open, high, low, close, period_start_minute) =
                row.map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                    reason: e.to_string(),
                })?;
            candles.push(Candle {
                open,
                high,
                low,
                close,
                period_start_minute,
                timestamp: parse_timestamp(&timestamp)?,
            });
        }

        Ok(candles)
    }

    fn append_signal(&self, signal: &Signal) -> Result<(), TickforgeError> {
        let conn = self.conn()?;

        let rules_passed =
            serde_json::to_string(&signal.rules_passed).map_err(|e| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;
        let rules_failed =
            serde_json::to_string(&signal.rules_failed).map_err(|e| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO signals
             (time, symbol, price, direction, rules_passed, rules_failed, conviction, timeframe)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                signal.time.to_rfc3339(),
                signal.symbol,
                signal.price,
                signal.direction.as_str(),
                rules_passed,
                rules_failed,
                signal.conviction,
                signal.timeframe.label(),
            ],
        )
        .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn signals_since(&self, from: DateTime<Utc>) -> Result<Vec<Signal>, TickforgeError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT time, symbol, price, direction, rules_passed, rules_failed, conviction, timeframe
                 FROM signals
                 WHERE time >= ?1
                 ORDER BY time ASC",
            )
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![from.to_rfc3339()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let mut signals = Vec::new();
        for row in rows {
            let (time, symbol, price, direction, rules_passed, rules_failed, conviction, timeframe) =
                row.map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                    reason: e.to_string(),
                })?;
            signals.push(Signal {
                time: parse_timestamp(&time)?,
                symbol,
                price,
                direction: parse_direction(&direction)?,
                rules_passed: parse_rules(&rules_passed)?,
                rules_failed: parse_rules(&rules_failed)?,
                conviction,
                timeframe: parse_timeframe(&timeframe)?,
            });
        }

        Ok(signals)
    }

    fn save_rule_weights(&self, weights: &[(RuleKind, u32)]) -> Result<(), TickforgeError> {
        let mut conn = self.conn()?;

        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        for (kind, weight) in weights {
            tx.execute(
                "INSERT OR REPLACE INTO rule_weights (rule, weight) VALUES (?1, ?2)",
                params![kind.name(), weight],
            )
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn load_rule_weights(&self) -> Result<Vec<(RuleKind, u32)>, TickforgeError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT rule, weight FROM rule_weights ORDER BY rule")
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })
            .map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                reason: e.to_string(),
            })?;

        let mut weights = Vec::new();
        for row in rows {
            let (name, weight) =
                row.map_err(|e: rusqlite::Error| TickforgeError::Persistence {
                    reason: e.to_string(),
                })?;
            match RuleKind::parse(&name) {
                Some(kind) => weights.push((kind, weight)),
                // tolerate rows written by a newer rule table
                None => warn!(rule = %name, "skipping unknown stored rule weight"),
            }
        }

        Ok(weights)
    }
}
