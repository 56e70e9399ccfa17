use super::SeriesResolver;
use crate::{Stats52w, Symbol};

/// Calendar days fetched so that a full trading year survives normalization.
pub const STATS_LOOKBACK_DAYS: i64 = 300;
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// 52-week range computed from the same canonical series charts use.
#[derive(Clone)]
pub struct StatsAggregator {
    series: SeriesResolver,
}

impl StatsAggregator {
    pub fn new(series: SeriesResolver) -> Self {
        Self { series }
    }

    pub async fn stats_52w(&self, symbol: &Symbol) -> Stats52w {
        let mut series = self.series.resolve(symbol, STATS_LOOKBACK_DAYS).await;
        series.truncate_to_recent(TRADING_DAYS_PER_YEAR);
        range(&series.closes())
    }
}

fn range(closes: &[f64]) -> Stats52w {
    let high = closes.iter().copied().reduce(f64::max);
    let low = closes.iter().copied().reduce(f64::min);
    Stats52w { high, low }
}
