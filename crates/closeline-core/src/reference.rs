//! Cached reference lookups: earnings, dividends and market breadth.
//!
//! A rate-limited provider surfaces as [`ResolveError::RateLimited`]; any
//! other failure degrades to an `available: false` record.

use std::sync::Arc;

use time::Duration as CalendarDuration;
use tracing::warn;

use crate::cache::{CacheKey, CacheMode, CacheStore};
use crate::clock::{Clock, MarketHours};
use crate::data_source::Endpoint;
use crate::error::ResolveError;
use crate::routing::{ResolverPolicy, RouteFailure, SourceRegistry};
use crate::{change_pct, BreadthEntry, DividendInfo, EarningsInfo, MarketBreadth, Symbol};

/// Calendar days scanned for the next earnings date.
pub const EARNINGS_LOOKAHEAD_DAYS: i64 = 90;
pub const BREADTH_SYMBOLS: [&str; 5] = ["VIX", "TNX", "SPY", "XLK", "XLF"];

#[derive(Clone)]
pub struct ReferenceData {
    registry: Arc<SourceRegistry>,
    policy: Arc<ResolverPolicy>,
    clock: Arc<dyn Clock>,
    market_hours: MarketHours,
    cache: CacheStore,
    cache_mode: CacheMode,
}

impl ReferenceData {
    pub fn new(
        registry: Arc<SourceRegistry>,
        policy: Arc<ResolverPolicy>,
        clock: Arc<dyn Clock>,
        market_hours: MarketHours,
        cache: CacheStore,
    ) -> Self {
        Self {
            registry,
            policy,
            clock,
            market_hours,
            cache,
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub async fn earnings(&self, symbol: &Symbol) -> Result<EarningsInfo, ResolveError> {
        let key = CacheKey::new("earnings", Some(symbol.as_str()), "");
        self.cache
            .memoize(key, self.cache_mode, || self.fetch_earnings(symbol))
            .await
    }

    pub async fn dividends(&self, symbol: &Symbol) -> Result<DividendInfo, ResolveError> {
        let key = CacheKey::new("dividends", Some(symbol.as_str()), "");
        self.cache
            .memoize(key, self.cache_mode, || self.fetch_dividends(symbol))
            .await
    }

    /// Batch quote over [`BREADTH_SYMBOLS`]; symbols the provider omits are
    /// left out, and an empty result is `NoDataAvailable`.
    pub async fn market_breadth(&self) -> Result<MarketBreadth, ResolveError> {
        let key = CacheKey::new("breadth", None, BREADTH_SYMBOLS.join(","));
        self.cache
            .memoize(key, self.cache_mode, || self.fetch_breadth())
            .await
    }

    async fn fetch_earnings(&self, symbol: &Symbol) -> Result<EarningsInfo, ResolveError> {
        let today = self.market_hours.session_state(self.clock.now()).today;
        let until = today.saturating_add(CalendarDuration::days(EARNINGS_LOOKAHEAD_DAYS));
        let requested = symbol.clone();
        let routed = self
            .registry
            .route(Endpoint::Earnings, &self.policy.earnings, move |source| {
                source.earnings(requested.clone(), today, until)
            })
            .await;

        match routed {
            Ok(success) => Ok(EarningsInfo {
                ticker: symbol.to_string(),
                next_earnings_date: success.data,
                available: success.data.is_some(),
                reason: None,
            }),
            Err(failure) => {
                surface_rate_limit(symbol.as_str(), &failure)?;
                Ok(EarningsInfo {
                    ticker: symbol.to_string(),
                    next_earnings_date: None,
                    available: false,
                    reason: Some(String::from("fetch_error")),
                })
            }
        }
    }

    async fn fetch_dividends(&self, symbol: &Symbol) -> Result<DividendInfo, ResolveError> {
        let requested = symbol.clone();
        let routed = self
            .registry
            .route(Endpoint::Dividends, &self.policy.dividends, move |source| {
                source.dividends(requested.clone())
            })
            .await;

        match routed {
            Ok(success) => Ok(DividendInfo::from_lookup(symbol.as_str(), success.data)),
            Err(failure) => {
                surface_rate_limit(symbol.as_str(), &failure)?;
                Ok(DividendInfo::unavailable(symbol.as_str(), "fetch_error"))
            }
        }
    }

    async fn fetch_breadth(&self) -> Result<MarketBreadth, ResolveError> {
        let label = BREADTH_SYMBOLS.join(",");
        let symbols = BREADTH_SYMBOLS
            .iter()
            .map(|raw| Symbol::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let routed = self
            .registry
            .route(Endpoint::BatchQuote, &self.policy.batch_quote, move |source| {
                source.batch_quotes(symbols.clone())
            })
            .await;

        let quotes = match routed {
            Ok(success) => success.data,
            Err(failure) => {
                surface_rate_limit(&label, &failure)?;
                return Err(ResolveError::no_data(label));
            }
        };

        let breadth = quotes
            .into_iter()
            .filter(|(symbol, _)| BREADTH_SYMBOLS.contains(&symbol.as_str()))
            .map(|(symbol, live)| {
                let last_close = live.previous_close.unwrap_or(live.price);
                let entry = BreadthEntry {
                    current_price: live.price,
                    last_close,
                    change_pct: change_pct(live.price, last_close),
                };
                (symbol.to_string(), entry)
            })
            .collect::<MarketBreadth>();

        if breadth.is_empty() {
            return Err(ResolveError::no_data(label));
        }
        Ok(breadth)
    }
}

/// Surfaces rate limits; every other failure is left to the caller to degrade.
fn surface_rate_limit(label: &str, failure: &RouteFailure) -> Result<(), ResolveError> {
    if failure.any_rate_limited() {
        return Err(ResolveError::rate_limited(label));
    }
    warn!(subject = label, attempts = failure.attempts.len(), "reference lookup failed");
    Ok(())
}
