//! Offline test doubles for resolver-level tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use time::Date;

use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, HealthState, HealthStatus, SeriesRequest, SourceError,
    SourceFuture,
};
use crate::{DailyBar, DividendLookup, LivePrice, ProviderId, Series, Symbol};

/// Builds bars from `(YYYY-MM-DD, close)` pairs.
///
/// # Panics
///
/// Panics on an invalid date or close; intended for test fixtures.
pub fn bars(rows: &[(&str, f64)]) -> Vec<DailyBar> {
    rows.iter()
        .map(|(day, close)| DailyBar::parse(day, *close).expect("fixture bar must be valid"))
        .collect()
}

/// Scriptable in-memory `DataSource`.
///
/// Capabilities follow what was configured: a stub with bars serves
/// `DailySeries`, a stub with prices serves `LiveQuote`, and so on.
pub struct StubSource {
    id: ProviderId,
    capabilities: CapabilitySet,
    health: HealthState,
    delay: Option<Duration>,
    series_default: Option<Result<Vec<DailyBar>, SourceError>>,
    series_by_symbol: HashMap<String, Result<Vec<DailyBar>, SourceError>>,
    price_default: Option<Result<LivePrice, SourceError>>,
    price_by_symbol: HashMap<String, LivePrice>,
    earnings: Option<Result<Option<Date>, SourceError>>,
    dividends: Option<Result<DividendLookup, SourceError>>,
    series_calls: AtomicUsize,
    quote_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    earnings_calls: AtomicUsize,
    dividend_calls: AtomicUsize,
    series_requests: Mutex<Vec<SeriesRequest>>,
}

impl StubSource {
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            capabilities: CapabilitySet::default(),
            health: HealthState::Healthy,
            delay: None,
            series_default: None,
            series_by_symbol: HashMap::new(),
            price_default: None,
            price_by_symbol: HashMap::new(),
            earnings: None,
            dividends: None,
            series_calls: AtomicUsize::new(0),
            quote_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            earnings_calls: AtomicUsize::new(0),
            dividend_calls: AtomicUsize::new(0),
            series_requests: Mutex::new(Vec::new()),
        }
    }

    /// Serves these bars for every symbol without a specific entry.
    pub fn with_bars(mut self, rows: &[(&str, f64)]) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::DailySeries);
        self.series_default = Some(Ok(bars(rows)));
        self
    }

    pub fn with_symbol_bars(mut self, symbol: &str, rows: &[(&str, f64)]) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::DailySeries);
        self.series_by_symbol
            .insert(symbol.to_ascii_uppercase(), Ok(bars(rows)));
        self
    }

    /// Fails every series call with `error`.
    pub fn failing(mut self, error: SourceError) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::DailySeries);
        self.series_default = Some(Err(error));
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::LiveQuote);
        self.price_default = Some(
            LivePrice::new(price, None).map_err(|error| SourceError::internal(error.to_string())),
        );
        self
    }

    pub fn with_symbol_price(mut self, symbol: &str, price: f64, previous_close: Option<f64>) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::LiveQuote);
        if let Ok(live) = LivePrice::new(price, previous_close) {
            self.price_by_symbol.insert(symbol.to_ascii_uppercase(), live);
        }
        self
    }

    pub fn failing_quotes(mut self, error: SourceError) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::LiveQuote);
        self.price_default = Some(Err(error));
        self
    }

    /// Serves batch quotes from the configured prices.
    pub fn with_batch_quotes(mut self) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::BatchQuote);
        self
    }

    pub fn with_earnings(mut self, outcome: Result<Option<Date>, SourceError>) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::Earnings);
        self.earnings = Some(outcome);
        self
    }

    pub fn with_dividends(mut self, outcome: Result<DividendLookup, SourceError>) -> Self {
        self.capabilities = self.capabilities.with(Endpoint::Dividends);
        self.dividends = Some(outcome);
        self
    }

    /// Sleeps before answering any call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_health(mut self, health: HealthState) -> Self {
        self.health = health;
        self
    }

    pub fn series_calls(&self) -> usize {
        self.series_calls.load(Ordering::SeqCst)
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn earnings_calls(&self) -> usize {
        self.earnings_calls.load(Ordering::SeqCst)
    }

    pub fn dividend_calls(&self) -> usize {
        self.dividend_calls.load(Ordering::SeqCst)
    }

    /// `min_bars` of every series request, in call order.
    pub fn requested_bars(&self) -> Vec<usize> {
        self.series_requests
            .lock()
            .map(|requests| requests.iter().map(|req| req.min_bars).collect())
            .unwrap_or_default()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn price_for(&self, symbol: &Symbol) -> Result<LivePrice, SourceError> {
        if let Some(price) = self.price_by_symbol.get(symbol.as_str()) {
            return Ok(*price);
        }
        self.price_default
            .clone()
            .unwrap_or_else(|| Err(SourceError::no_data(format!("no stub price for '{symbol}'"))))
    }
}

impl DataSource for StubSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn daily_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, Series> {
        Box::pin(async move {
            self.series_calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut requests) = self.series_requests.lock() {
                requests.push(req.clone());
            }
            self.pause().await;

            let outcome = self
                .series_by_symbol
                .get(req.symbol.as_str())
                .or(self.series_default.as_ref())
                .cloned()
                .unwrap_or_else(|| {
                    Err(SourceError::no_data(format!("no stub bars for '{}'", req.symbol)))
                })?;
            Ok(Series::from_bars(req.symbol, outcome))
        })
    }

    fn live_price<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, LivePrice> {
        Box::pin(async move {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            self.price_for(&symbol)
        })
    }

    fn batch_quotes<'a>(&'a self, symbols: Vec<Symbol>) -> SourceFuture<'a, Vec<(Symbol, LivePrice)>> {
        Box::pin(async move {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            if let Some(Err(error)) = &self.price_default {
                return Err(error.clone());
            }
            Ok(symbols
                .into_iter()
                .filter_map(|symbol| {
                    let price = self.price_for(&symbol).ok()?;
                    Some((symbol, price))
                })
                .collect())
        })
    }

    fn earnings<'a>(&'a self, symbol: Symbol, from: Date, to: Date) -> SourceFuture<'a, Option<Date>> {
        let _ = (symbol, from, to);
        Box::pin(async move {
            self.earnings_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            self.earnings.clone().unwrap_or(Ok(None))
        })
    }

    fn dividends<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, DividendLookup> {
        let _ = symbol;
        Box::pin(async move {
            self.dividend_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            self.dividends.clone().unwrap_or(Ok(DividendLookup::NoData))
        })
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move {
            HealthStatus {
                state: self.health,
                consecutive_failures: 0,
            }
        })
    }
}
