//! Canonical series resolution and everything derived from it.
//!
//! [`SeriesResolver`] is the only path to historical closes. Quotes and
//! 52-week stats are built on its output so every consumer sees the same
//! dates.

mod quote;
mod series;
mod stats;

pub use quote::{FailedSymbol, FanOutPolicy, FanOutReport, QuoteResolver, QUOTE_WINDOW_DAYS};
pub use series::{clamp_days, Resolution, SeriesResolver, MAX_DAYS, MIN_DAYS, SERIES_BUFFER};
pub use stats::{StatsAggregator, STATS_LOOKBACK_DAYS, TRADING_DAYS_PER_YEAR};
