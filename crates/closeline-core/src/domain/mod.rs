//! # Domain Models
//!
//! Canonical domain types for closeline market data.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated ticker, classified into an [`AssetClass`] |
//! | [`DailyBar`] | One settled daily close |
//! | [`Series`] | Ordered, date-unique daily closes for one symbol |
//! | [`SeriesColumns`] | `{dates, closes}` shape for chart consumers |
//! | [`Quote`] | Live price pinned to the canonical last close |
//! | [`Stats52w`] | 52-week high/low |
//!
//! Reference records ([`EarningsInfo`], [`DividendInfo`], [`MarketBreadth`])
//! carry an `available` flag instead of failing when a provider has no data.

mod quote;
mod reference;
pub(crate) mod series;
mod symbol;

pub use quote::{change_pct, round_to, LivePrice, Quote, Stats52w};
pub use reference::{
    BreadthEntry, DividendInfo, DividendLookup, EarningsInfo, MarketBreadth, RsiSeries,
};
pub use series::{format_iso_date, iso_date, parse_iso_date, DailyBar, Series, SeriesColumns};
pub use symbol::{AssetClass, Symbol};
