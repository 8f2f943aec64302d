//! Market-hours state machine.
//!
//! Derived purely from day-of-week and time-of-day against a fixed trading
//! session window, re-evaluated on a timer rather than gated by ticks.
//! Transitions are broadcast as events by the caller.

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Open,
    Closed,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::Open => f.write_str("OPEN"),
            MarketStatus::Closed => f.write_str("CLOSED"),
        }
    }
}

/// Trading session bounds, expressed in the feed's timezone. Weekends are
/// always closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionWindow {
    pub opens: NaiveTime,
    pub closes: NaiveTime,
}

impl Default for SessionWindow {
    fn default() -> Self {
        // 09:15-15:30, the cash session the feed trades
        SessionWindow {
            opens: NaiveTime::from_hms_opt(9, 15, 0).expect("valid session open"),
            closes: NaiveTime::from_hms_opt(15, 30, 0).expect("valid session close"),
        }
    }
}

impl SessionWindow {
    pub fn status_at(&self, at: DateTime<Utc>) -> MarketStatus {
        match at.weekday() {
            Weekday::Sat | Weekday::Sun => return MarketStatus::Closed,
            _ => {}
        }
        let time = at.time();
        if time >= self.opens && time < self.closes {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        }
    }
}

pub struct MarketHours {
    window: SessionWindow,
    status: MarketStatus,
}

impl MarketHours {
    pub fn new(window: SessionWindow) -> Self {
        MarketHours {
            window,
            status: MarketStatus::Closed,
        }
    }

    pub fn status(&self) -> MarketStatus {
        self.status
    }

    /// Timer-driven re-evaluation. Returns the new status on a transition,
    /// `None` while the state is unchanged.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<MarketStatus> {
        let next = self.window.status_at(now);
        if next != self.status {
            self.status = next;
            Some(next)
        } else {
            None
        }
    }
}
