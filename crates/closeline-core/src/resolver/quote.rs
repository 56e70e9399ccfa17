use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::SeriesResolver;
use crate::data_source::Endpoint;
use crate::error::ResolveError;
use crate::{change_pct, Quote, Symbol};

/// Series window used to pin a quote's last close.
pub const QUOTE_WINDOW_DAYS: i64 = 5;

/// Builds quotes whose last close is the final bar of the canonical series.
#[derive(Clone)]
pub struct QuoteResolver {
    series: SeriesResolver,
}

impl QuoteResolver {
    pub fn new(series: SeriesResolver) -> Self {
        Self { series }
    }

    pub fn series(&self) -> &SeriesResolver {
        &self.series
    }

    /// Fails with `NoDataAvailable` when the series is empty. A missing live
    /// price is not a failure: the quote falls back to the last close.
    pub async fn quote(&self, symbol: &Symbol) -> Result<Quote, ResolveError> {
        let series = self.series.resolve_required(symbol, QUOTE_WINDOW_DAYS).await?;
        let last = *series
            .last()
            .ok_or_else(|| ResolveError::no_data(symbol.as_str()))?;

        let live_symbol = symbol.clone();
        let live = self
            .series
            .registry()
            .route(Endpoint::LiveQuote, &self.series.policy().live_quote, move |source| {
                source.live_price(live_symbol.clone())
            })
            .await;

        let (current_price, price_source) = match live {
            Ok(success) => (success.data.price, Some(success.selected_source)),
            Err(_) => {
                debug!(symbol = %symbol, "no live price; using last close");
                (last.close, None)
            }
        };

        Ok(Quote {
            symbol: symbol.clone(),
            last_close: last.close,
            last_close_date: last.date,
            current_price,
            change_pct: change_pct(current_price, last.close),
            price_source,
        })
    }

    /// Quotes many symbols with bounded concurrency, a per-symbol timeout and
    /// an overall budget. Work still running at the deadline is aborted and
    /// reported in `timed_out`.
    pub async fn quote_many(&self, symbols: Vec<Symbol>, policy: FanOutPolicy) -> FanOutReport {
        let deadline = tokio::time::Instant::now() + policy.budget;
        let permits = Arc::new(Semaphore::new(policy.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut order = HashMap::new();
        for symbol in symbols {
            if order.contains_key(&symbol) {
                continue;
            }
            let position = order.len();
            order.insert(symbol.clone(), position);

            let resolver = self.clone();
            let permits = permits.clone();
            let per_symbol = policy.per_symbol_timeout;
            tasks.spawn(async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => tokio::time::timeout(per_symbol, resolver.quote(&symbol))
                        .await
                        .map_err(|_| ()),
                    Err(_) => Err(()),
                };
                (symbol, outcome)
            });
        }

        let mut quotes = Vec::new();
        let mut failed = Vec::new();
        let mut timed_out = Vec::new();
        let mut pending = order.clone();

        loop {
            let next = tokio::time::timeout_at(deadline, tasks.join_next()).await;
            match next {
                Ok(Some(Ok((symbol, outcome)))) => {
                    pending.remove(&symbol);
                    match outcome {
                        Ok(Ok(quote)) => quotes.push(quote),
                        Ok(Err(error)) => failed.push(FailedSymbol::new(symbol, &error)),
                        Err(()) => timed_out.push(symbol),
                    }
                }
                Ok(Some(Err(join_error))) => {
                    warn!(error = %join_error, "quote task ended abnormally");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(outstanding = pending.len(), "fan-out budget exhausted; aborting");
                    tasks.abort_all();
                    break;
                }
            }
        }
        timed_out.extend(pending.into_keys());

        let position = |symbol: &Symbol| order.get(symbol).copied().unwrap_or(usize::MAX);
        quotes.sort_by_key(|quote| position(&quote.symbol));
        failed.sort_by_key(|failure| position(&failure.symbol));
        timed_out.sort_by_key(|symbol| position(symbol));

        FanOutReport {
            partial: !timed_out.is_empty(),
            quotes,
            failed,
            timed_out,
        }
    }
}

/// Limits for [`QuoteResolver::quote_many`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutPolicy {
    pub max_concurrency: usize,
    pub per_symbol_timeout: Duration,
    pub budget: Duration,
}

impl Default for FanOutPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            per_symbol_timeout: Duration::from_secs(3),
            budget: Duration::from_secs(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSymbol {
    pub symbol: Symbol,
    pub code: &'static str,
    pub message: String,
}

impl FailedSymbol {
    fn new(symbol: Symbol, error: &ResolveError) -> Self {
        Self {
            symbol,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Fan-out result; `partial` is set when some symbols never finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanOutReport {
    pub quotes: Vec<Quote>,
    pub failed: Vec<FailedSymbol>,
    pub timed_out: Vec<Symbol>,
    pub partial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, MarketHours};
    use crate::data_source::{DataSource, SourceError};
    use crate::routing::{ResolverPolicy, SourceRegistry};
    use crate::testing::StubSource;
    use crate::ProviderId;
    use time::macros::{date, datetime};

    fn resolver(sources: Vec<Arc<dyn DataSource>>) -> QuoteResolver {
        QuoteResolver::new(SeriesResolver::new(
            Arc::new(SourceRegistry::new(sources)),
            Arc::new(ResolverPolicy::default()),
            Arc::new(FixedClock::new(datetime!(2024-01-10 22:00 UTC))),
            MarketHours::default(),
        ))
    }

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid")
    }

    #[tokio::test]
    async fn last_close_comes_from_the_series_not_the_provider() {
        let resolver = resolver(vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[("2024-01-09", 100.0), ("2024-01-10", 102.0)])),
            Arc::new(StubSource::new(ProviderId::Finnhub).with_symbol_price("AAPL", 104.04, Some(50.0))),
        ]);

        let quote = resolver.quote(&symbol("AAPL")).await.expect("quote");

        assert_eq!(quote.last_close, 102.0);
        assert_eq!(quote.last_close_date, date!(2024 - 01 - 10));
        assert_eq!(quote.current_price, 104.04);
        assert_eq!(quote.change_pct, 2.0);
        assert_eq!(quote.price_source, Some(ProviderId::Finnhub));
    }

    #[tokio::test]
    async fn live_price_failure_falls_back_to_last_close() {
        let resolver = resolver(vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[("2024-01-10", 102.0)])),
            Arc::new(StubSource::new(ProviderId::Finnhub).failing_quotes(SourceError::unavailable("down"))),
        ]);

        let quote = resolver.quote(&symbol("AAPL")).await.expect("quote");

        assert_eq!(quote.current_price, 102.0);
        assert_eq!(quote.change_pct, 0.0);
        assert_eq!(quote.price_source, None);
    }

    #[tokio::test]
    async fn zero_last_close_yields_zero_change() {
        let resolver = resolver(vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).with_bars(&[("2024-01-10", 0.0)])),
            Arc::new(StubSource::new(ProviderId::Finnhub).with_price(3.0)),
        ]);

        let quote = resolver.quote(&symbol("PENNY")).await.expect("quote");

        assert_eq!(quote.change_pct, 0.0);
    }

    #[tokio::test]
    async fn empty_series_means_no_quote() {
        let resolver = resolver(vec![
            Arc::new(StubSource::new(ProviderId::Yahoo).failing(SourceError::no_data("unknown"))),
            Arc::new(StubSource::new(ProviderId::Finnhub).with_price(3.0)),
        ]);

        let error = resolver.quote(&symbol("ZZZZ")).await.expect_err("no data");

        assert_eq!(error, ResolveError::no_data("ZZZZ"));
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_preserves_order_and_reports_failures() {
        let resolver = resolver(vec![
            Arc::new(
                StubSource::new(ProviderId::Yahoo)
                    .with_symbol_bars("AAPL", &[("2024-01-10", 1.0)])
                    .with_symbol_bars("MSFT", &[("2024-01-10", 2.0)]),
            ),
            Arc::new(
                StubSource::new(ProviderId::Finnhub)
                    .with_symbol_price("AAPL", 1.0, None)
                    .with_symbol_price("MSFT", 2.0, None),
            ),
        ]);

        let report = resolver
            .quote_many(
                vec![symbol("MSFT"), symbol("ZZZZ"), symbol("AAPL"), symbol("MSFT")],
                FanOutPolicy::default(),
            )
            .await;

        let quoted = report.quotes.iter().map(|quote| quote.symbol.as_str()).collect::<Vec<_>>();
        assert_eq!(quoted, vec!["MSFT", "AAPL"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "resolve.no_data");
        assert!(report.timed_out.is_empty());
        assert!(!report.partial);
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_per_symbol_timeout_marks_partial() {
        let resolver = resolver(vec![Arc::new(
            StubSource::new(ProviderId::Yahoo)
                .with_bars(&[("2024-01-10", 1.0)])
                .with_delay(Duration::from_secs(5)),
        )]);

        let report = resolver
            .quote_many(vec![symbol("AAPL"), symbol("MSFT")], FanOutPolicy::default())
            .await;

        assert!(report.quotes.is_empty());
        assert_eq!(report.timed_out, vec![symbol("AAPL"), symbol("MSFT")]);
        assert!(report.partial);
    }
}
