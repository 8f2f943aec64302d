//! Broker access port trait.
//!
//! One connection object serves both the live ticker and historical-data
//! requests; callers must serialize historical queries against any
//! in-flight ticker setup.

use crate::domain::candle::{Candle, Timeframe};
use crate::domain::error::TickforgeError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerCredentials {
    pub api_key: String,
    pub access_token: String,
}

pub trait BrokerPort {
    /// Establish the broker session. Credential rejection surfaces as
    /// [`TickforgeError::Authentication`].
    fn connect(&mut self, credentials: &BrokerCredentials) -> Result<(), TickforgeError>;

    /// Ordered historical candles for the range. May fail on network or
    /// auth; the historical cache treats any failure as "use cached data".
    fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, TickforgeError>;
}
