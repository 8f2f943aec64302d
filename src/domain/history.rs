//! Historical data resolution: remote fetch merged into the durable cache.
//!
//! The store, not the fetch response, is the single source of truth handed
//! back to the caller. Repeated backtests over overlapping windows get
//! progressively cheaper, and a broker outage degrades to cache-only data
//! instead of failing the request.

use super::candle::{Candle, Timeframe};
use super::error::TickforgeError;
use crate::ports::broker_port::BrokerPort;
use crate::ports::store_port::StorePort;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ResolvedHistory {
    pub candles: Vec<Candle>,
    /// Human-readable note on whether fresh data was merged or the
    /// cache-only fallback was used.
    pub data_source_message: String,
}

/// Resolve a request to a candle series.
///
/// Fetch failures and upsert failures both fall through to the cached
/// range; only an empty cache is fatal ([`TickforgeError::DataUnavailable`]),
/// aborting the enclosing backtest request.
pub fn resolve_history(
    broker: &dyn BrokerPort,
    store: &dyn StorePort,
    request: &HistoryRequest,
) -> Result<ResolvedHistory, TickforgeError> {
    let data_source_message = match broker.fetch_candles(
        &request.instrument,
        request.timeframe,
        request.from,
        request.to,
    ) {
        Ok(fresh) => {
            match store.upsert_candles(&request.instrument, request.timeframe, &fresh) {
                Ok(inserted) => {
                    info!(
                        instrument = %request.instrument,
                        timeframe = %request.timeframe,
                        fetched = fresh.len(),
                        inserted,
                        "merged broker data into cache"
                    );
                    format!(
                        "merged {} fresh candles from the broker ({} new)",
                        fresh.len(),
                        inserted
                    )
                }
                Err(e) => {
                    warn!(error = %e, "candle upsert failed; continuing with cached data");
                    "broker data could not be cached; using stored data only".to_string()
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "broker fetch failed; falling back to cache");
            format!("broker unavailable ({e}); using cached data only")
        }
    };

    let candles = store.candles_in_range(
        &request.instrument,
        request.timeframe,
        request.from,
        request.to,
    )?;

    if candles.is_empty() {
        return Err(TickforgeError::DataUnavailable {
            instrument: request.instrument.clone(),
            timeframe: request.timeframe.label().to_string(),
        });
    }

    Ok(ResolvedHistory {
        candles,
        data_source_message,
    })
}
