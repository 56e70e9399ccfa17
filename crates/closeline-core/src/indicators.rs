//! Technical indicators over the canonical series.
//!
//! Inputs always come from [`SeriesResolver`], so indicator dates line up
//! with chart dates.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use time::Date;

use crate::cache::{CacheKey, CacheMode, CacheStore};
use crate::resolver::SeriesResolver;
use crate::{round_to, RsiSeries, Series, Symbol};

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_RSI_DAYS: i64 = 100;
pub const DEFAULT_CORRELATION_DAYS: i64 = 60;
/// Fewest aligned returns a correlation is computed from.
pub const MIN_CORRELATION_POINTS: usize = 10;

/// Benchmarks with the symbols tried for each, in order.
const CORRELATION_TARGETS: [(&str, &[&str]); 5] = [
    ("SPY", &["SPY"]),
    ("XLK", &["XLK"]),
    ("XLF", &["XLF"]),
    ("VIX", &["VIX", "^VIX", "VIXY"]),
    ("TNX", &["TNX", "^TNX", "US10Y", "IEF"]),
];

/// Wilder-smoothed RSI. Returns nothing when there are fewer than
/// `period + 1` closes.
pub fn rsi_wilder(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let weight = period as f64;
    let (mut avg_gain, mut avg_loss) = closes[..=period]
        .windows(2)
        .map(|pair| split_change(pair[1] - pair[0]))
        .fold((0.0, 0.0), |(gains, losses), (gain, loss)| (gains + gain, losses + loss));
    avg_gain /= weight;
    avg_loss /= weight;

    let mut values = Vec::with_capacity(closes.len() - period);
    values.push(rsi_value(avg_gain, avg_loss));
    for pair in closes[period..].windows(2) {
        let (gain, loss) = split_change(pair[1] - pair[0]);
        avg_gain = (avg_gain * (weight - 1.0) + gain) / weight;
        avg_loss = (avg_loss * (weight - 1.0) + loss) / weight;
        values.push(rsi_value(avg_gain, avg_loss));
    }
    values
}

fn split_change(change: f64) -> (f64, f64) {
    (change.max(0.0), (-change).max(0.0))
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Simple daily returns keyed by the later bar's date. A zero close is
/// skipped over rather than divided by. Fewer than three bars yield nothing.
pub fn returns(series: &Series) -> Vec<(Date, f64)> {
    let bars = series.bars();
    if bars.len() < 3 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(bars.len() - 1);
    let mut prev = bars[0].close;
    for bar in &bars[1..] {
        if prev != 0.0 {
            out.push((bar.date, bar.close / prev - 1.0));
        }
        prev = bar.close;
    }
    out
}

/// Pearson correlation of two equal-length samples; `None` for fewer than
/// two points or a zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[a.len() - n..], &b[b.len() - n..]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Pairs returns that share a date, keeping the most recent `limit`.
fn align(base: &[(Date, f64)], other: &[(Date, f64)], limit: usize) -> (Vec<f64>, Vec<f64>) {
    let other = other.iter().copied().collect::<HashMap<_, _>>();
    let mut pairs = base
        .iter()
        .filter_map(|(date, value)| other.get(date).map(|matched| (*value, *matched)))
        .collect::<Vec<_>>();
    if pairs.len() > limit {
        pairs.drain(..pairs.len() - limit);
    }
    pairs.into_iter().unzip()
}

#[derive(Clone)]
pub struct Indicators {
    series: SeriesResolver,
    cache: CacheStore,
    cache_mode: CacheMode,
}

impl Indicators {
    pub fn new(series: SeriesResolver, cache: CacheStore) -> Self {
        Self {
            series,
            cache,
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Last `days` RSI values; a `period` below 2 falls back to 14.
    pub async fn rsi(&self, symbol: &Symbol, period: usize, days: i64) -> RsiSeries {
        let period = if period < 2 { DEFAULT_RSI_PERIOD } else { period };
        let keep = usize::try_from(days.max(0)).unwrap_or(usize::MAX);
        let key = CacheKey::new("rsi", Some(symbol.as_str()), format!("period={period}&days={days}"));

        let computed = self
            .cache
            .memoize(key, self.cache_mode, || async {
                let need = i64::try_from(period.saturating_add(20)).unwrap_or(i64::MAX).max(days);
                let closes = self.series.resolve(symbol, need).await.closes();
                let mut values = rsi_wilder(&closes, period);
                if values.len() > keep {
                    values.drain(..values.len() - keep);
                }
                Ok::<_, Infallible>(RsiSeries { period, values })
            })
            .await;
        match computed {
            Ok(rsi) => rsi,
            Err(never) => match never {},
        }
    }

    /// Correlation of daily returns against a fixed benchmark set. Targets
    /// without enough overlapping data are omitted.
    pub async fn correlation(&self, symbol: &Symbol, days: i64) -> BTreeMap<String, f64> {
        let key = CacheKey::new("correlation", Some(symbol.as_str()), format!("days={days}"));
        let computed = self
            .cache
            .memoize(key, self.cache_mode, || async {
                Ok::<_, Infallible>(self.compute_correlation(symbol, days).await)
            })
            .await;
        match computed {
            Ok(table) => table,
            Err(never) => match never {},
        }
    }

    async fn compute_correlation(&self, symbol: &Symbol, days: i64) -> BTreeMap<String, f64> {
        let need = days.saturating_add(30).max(100);
        let limit = usize::try_from(days.max(0)).unwrap_or(usize::MAX);
        let mut table = BTreeMap::new();

        let base = returns(&self.series.resolve(symbol, need).await);
        if base.is_empty() {
            return table;
        }

        for (label, variants) in CORRELATION_TARGETS {
            let Some(target) = self.first_returns(variants, need).await else {
                continue;
            };
            let (a, b) = align(&base, &target, limit);
            if a.len() < MIN_CORRELATION_POINTS {
                continue;
            }
            if let Some(value) = pearson(&a, &b) {
                table.insert(label.to_owned(), round_to(value, 4));
            }
        }
        table
    }

    async fn first_returns(&self, variants: &[&str], need: i64) -> Option<Vec<(Date, f64)>> {
        for raw in variants {
            let Ok(candidate) = Symbol::parse(raw) else {
                continue;
            };
            let target = returns(&self.series.resolve(&candidate, need).await);
            if !target.is_empty() {
                return Some(target);
            }
        }
        None
    }
}
