use std::sync::Arc;

use tracing::{debug, warn};

use crate::calendar::CalendarNormalizer;
use crate::clock::{Clock, MarketHours, SessionState};
use crate::data_source::{Endpoint, SeriesRequest, SourceError};
use crate::error::ResolveError;
use crate::routing::{Attempt, ResolverPolicy, SourceRegistry};
use crate::{ProviderId, Series, SeriesColumns, Symbol};

pub const MIN_DAYS: usize = 2;
/// About five years of calendar days.
pub const MAX_DAYS: usize = 1825;
/// Extra bars asked of each adapter to absorb weekend and today filtering.
pub const SERIES_BUFFER: usize = 5;

/// Clamps a requested window into `MIN_DAYS..=MAX_DAYS`.
pub fn clamp_days(days: i64) -> usize {
    usize::try_from(days.max(0))
        .unwrap_or(MAX_DAYS)
        .clamp(MIN_DAYS, MAX_DAYS)
}

/// Outcome of one resolution, including why earlier providers were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub series: Series,
    pub selected: Option<ProviderId>,
    pub attempts: Vec<Attempt>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn into_required(self) -> Result<Series, ResolveError> {
        if !self.series.is_empty() {
            return Ok(self.series);
        }
        let symbol = self.series.symbol.to_string();
        if self.attempts.iter().any(|attempt| attempt.error.is_rate_limited()) {
            Err(ResolveError::rate_limited(symbol))
        } else {
            Err(ResolveError::no_data(symbol))
        }
    }
}

/// Resolves the canonical daily series for a symbol: providers are tried in
/// priority order and the first normalized, non-empty result wins. Results
/// from different providers are never merged.
#[derive(Clone)]
pub struct SeriesResolver {
    registry: Arc<SourceRegistry>,
    policy: Arc<ResolverPolicy>,
    clock: Arc<dyn Clock>,
    market_hours: MarketHours,
}

impl SeriesResolver {
    pub fn new(
        registry: Arc<SourceRegistry>,
        policy: Arc<ResolverPolicy>,
        clock: Arc<dyn Clock>,
        market_hours: MarketHours,
    ) -> Self {
        Self {
            registry,
            policy,
            clock,
            market_hours,
        }
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &Arc<ResolverPolicy> {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn market_hours(&self) -> MarketHours {
        self.market_hours
    }

    pub fn session_state(&self) -> SessionState {
        self.market_hours.session_state(self.clock.now())
    }

    pub async fn resolve_detailed(&self, symbol: &Symbol, days: i64) -> Resolution {
        let days = clamp_days(days);
        let asset_class = symbol.asset_class();
        // Captured once so every provider in the chain is judged alike.
        let state = self.session_state();
        let chain = self.policy.series_chain(asset_class);
        debug!(
            symbol = %symbol,
            days,
            asset_class = asset_class.as_str(),
            session_open = state.is_open(),
            "resolving series"
        );

        let request = SeriesRequest {
            symbol: symbol.clone(),
            min_bars: days + SERIES_BUFFER,
        };

        let routed = self
            .registry
            .route(Endpoint::DailySeries, chain, move |source| {
                let request = request.clone();
                Box::pin(async move {
                    let raw = source.daily_series(request).await?;
                    let mut normalized = CalendarNormalizer::normalize(raw, asset_class, state);
                    if normalized.is_empty() {
                        return Err(SourceError::no_data("series is empty after calendar normalization"));
                    }
                    normalized.truncate_to_recent(days);
                    Ok(normalized)
                })
            })
            .await;

        match routed {
            Ok(success) => Resolution {
                series: success.data,
                selected: Some(success.selected_source),
                attempts: success.attempts,
            },
            Err(failure) => {
                warn!(symbol = %symbol, attempts = failure.attempts.len(), "no provider returned a usable series");
                Resolution {
                    series: Series::empty(symbol.clone()),
                    selected: None,
                    attempts: failure.attempts,
                }
            }
        }
    }

    /// Chart mode: an empty series means no data, never an error.
    pub async fn resolve(&self, symbol: &Symbol, days: i64) -> Series {
        self.resolve_detailed(symbol, days).await.series
    }

    /// Strict mode for consumers that cannot work without bars.
    pub async fn resolve_required(&self, symbol: &Symbol, days: i64) -> Result<Series, ResolveError> {
        self.resolve_detailed(symbol, days).await.into_required()
    }

    pub async fn resolve_columns(&self, symbol: &Symbol, days: i64) -> SeriesColumns {
        self.resolve(symbol, days).await.to_columns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::data_source::DataSource;
    use crate::testing::StubSource;
    use time::macros::{date, datetime};

    fn resolver(sources: Vec<Arc<dyn DataSource>>) -> SeriesResolver {
        SeriesResolver::new(
            Arc::new(SourceRegistry::new(sources)),
            Arc::new(ResolverPolicy::default()),
            // Wednesday 2024-01-10, after the close.
            Arc::new(FixedClock::new(datetime!(2024-01-10 22:00 UTC))),
            MarketHours::default(),
        )
    }

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid")
    }

    #[test]
    fn days_are_clamped() {
        assert_eq!(clamp_days(-3), MIN_DAYS);
        assert_eq!(clamp_days(0), MIN_DAYS);
        assert_eq!(clamp_days(30), 30);
        assert_eq!(clamp_days(i64::MAX), MAX_DAYS);
    }

    #[tokio::test]
    async fn adapters_are_asked_for_a_buffered_window() {
        let stub = Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[("2024-01-09", 1.0)]));
        let resolver = resolver(vec![stub.clone()]);

        let _ = resolver.resolve(&symbol("AAPL"), 30).await;
        let _ = resolver.resolve(&symbol("AAPL"), 1).await;

        assert_eq!(stub.requested_bars(), vec![35, MIN_DAYS + SERIES_BUFFER]);
    }

    #[tokio::test]
    async fn output_is_truncated_to_the_most_recent_days() {
        let resolver = resolver(vec![Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[
            ("2024-01-03", 1.0),
            ("2024-01-04", 2.0),
            ("2024-01-05", 3.0),
            ("2024-01-08", 4.0),
        ]))]);

        let series = resolver.resolve(&symbol("AAPL"), 2).await;

        assert_eq!(series.dates(), vec![date!(2024 - 01 - 05), date!(2024 - 01 - 08)]);
    }

    #[tokio::test]
    async fn provider_whose_bars_all_normalize_away_is_skipped() {
        let weekend_only = Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[("2024-01-06", 9.0)]));
        let fallback = Arc::new(StubSource::new(ProviderId::TwelveData).with_bars(&[("2024-01-05", 5.0)]));
        let resolver = resolver(vec![weekend_only, fallback]);

        let resolution = resolver.resolve_detailed(&symbol("AAPL"), 10).await;

        assert_eq!(resolution.selected, Some(ProviderId::TwelveData));
        assert_eq!(resolution.series.closes(), vec![5.0]);
        assert_eq!(resolution.attempts.len(), 1);
        assert_eq!(resolution.attempts[0].error.code(), "source.no_data");
    }

    #[tokio::test]
    async fn crypto_chain_never_consults_the_equity_primary() {
        let yahoo = Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[("2024-01-06", 1.0)]));
        let twelve = Arc::new(StubSource::new(ProviderId::TwelveData).with_bars(&[("2024-01-06", 2.0)]));
        let resolver = resolver(vec![yahoo.clone(), twelve]);

        let series = resolver.resolve(&symbol("BTC-USD"), 7).await;

        assert_eq!(series.closes(), vec![2.0]);
        assert_eq!(yahoo.series_calls(), 0);
    }

    #[tokio::test]
    async fn required_mode_distinguishes_rate_limits_from_missing_data() {
        let limited = resolver(vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).failing(SourceError::unavailable("timeout"))),
            Arc::new(StubSource::new(ProviderId::TwelveData).failing(SourceError::rate_limited("429"))),
        ]);
        let missing = resolver(vec![Arc::new(
            StubSource::new(ProviderId::Yahoo).failing(SourceError::no_data("unknown symbol")),
        )]);

        assert_eq!(
            limited.resolve_required(&symbol("AAPL"), 5).await,
            Err(ResolveError::rate_limited("AAPL"))
        );
        assert_eq!(
            missing.resolve_required(&symbol("ZZZZ"), 5).await,
            Err(ResolveError::no_data("ZZZZ"))
        );
    }
}
