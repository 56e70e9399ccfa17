//! Injected time source and the market-session heuristic.
//!
//! The session is `Closed` on Saturdays and Sundays and from the configured
//! close hour onwards (market-local time); every other moment counts as
//! `Open`, pre-market included.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, UtcOffset, Weekday};

use crate::ValidationError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Settable clock for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    Open,
    Closed,
}

/// Calendar "today" plus session state, both in market-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub today: Date,
    pub session: MarketSession,
}

impl SessionState {
    pub const fn new(today: Date, session: MarketSession) -> Self {
        Self { today, session }
    }

    pub const fn is_open(&self) -> bool {
        matches!(self.session, MarketSession::Open)
    }
}

/// Regional market-close heuristic: a fixed UTC offset and close hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    utc_offset: UtcOffset,
    close_hour: u8,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            utc_offset: UtcOffset::from_hms(-5, 0, 0).unwrap_or(UtcOffset::UTC),
            close_hour: 16,
        }
    }
}

impl MarketHours {
    pub fn new(utc_offset_hours: i8, close_hour: u8) -> Result<Self, ValidationError> {
        let utc_offset = UtcOffset::from_hms(utc_offset_hours, 0, 0).map_err(|_| {
            ValidationError::InvalidSetting {
                key: "MARKET_UTC_OFFSET_HOURS",
                value: utc_offset_hours.to_string(),
            }
        })?;
        if close_hour > 23 {
            return Err(ValidationError::InvalidSetting {
                key: "MARKET_CLOSE_HOUR",
                value: close_hour.to_string(),
            });
        }
        Ok(Self {
            utc_offset,
            close_hour,
        })
    }

    pub const fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    pub const fn close_hour(&self) -> u8 {
        self.close_hour
    }

    pub fn is_market_open(&self, now: OffsetDateTime) -> bool {
        self.session_state(now).is_open()
    }

    pub fn session_state(&self, now: OffsetDateTime) -> SessionState {
        let local = now.to_offset(self.utc_offset);
        let weekend = matches!(local.weekday(), Weekday::Saturday | Weekday::Sunday);
        let session = if weekend || local.hour() >= self.close_hour {
            MarketSession::Closed
        } else {
            MarketSession::Open
        };
        SessionState::new(local.date(), session)
    }
}
