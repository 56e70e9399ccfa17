use time::Weekday;

use crate::clock::SessionState;
use crate::{AssetClass, Series};

/// Aligns raw provider bars to the trading calendar.
///
/// Output depends only on the arguments; callers pass the session state
/// captured from their clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarNormalizer;

impl CalendarNormalizer {
    pub fn normalize(series: Series, asset_class: AssetClass, state: SessionState) -> Series {
        match asset_class {
            AssetClass::Crypto => series,
            AssetClass::Equity => normalize_equity(series, state),
        }
    }
}

fn normalize_equity(mut series: Series, state: SessionState) -> Series {
    series.retain(|bar| !matches!(bar.date.weekday(), Weekday::Saturday | Weekday::Sunday));

    // An open session means today's bar is still an intraday value.
    if state.is_open() && series.last().is_some_and(|bar| bar.date == state.today) {
        series.pop_last();
    }
    series
}
