//! Data source trait and request/response types.
//!
//! This module defines the provider adapter contract (`DataSource`) that
//! every upstream implementation follows.
//!
//! # Endpoints
//!
//! | Endpoint | Method | Response | Description |
//! |----------|--------|----------|-------------|
//! | DailySeries | [`DataSource::daily_series`] | [`Series`] | Raw daily closes |
//! | LiveQuote | [`DataSource::live_price`] | [`LivePrice`] | Best-effort current price |
//! | BatchQuote | [`DataSource::batch_quotes`] | `Vec<(Symbol, LivePrice)>` | Multi-symbol quotes |
//! | Earnings | [`DataSource::earnings`] | `Option<Date>` | Next earnings date |
//! | Dividends | [`DataSource::dividends`] | [`DividendLookup`] | Latest dividend |
//!
//! A `SourceError` is a local, expected failure: the resolvers swallow it and
//! move on to the next provider in the chain.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DividendLookup, LivePrice, ProviderId, Series, Symbol};

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Data endpoint type used for routing and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    DailySeries,
    LiveQuote,
    BatchQuote,
    Earnings,
    Dividends,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DailySeries => "daily_series",
            Self::LiveQuote => "live_quote",
            Self::BatchQuote => "batch_quote",
            Self::Earnings => "earnings",
            Self::Dividends => "dividends",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub daily_series: bool,
    pub live_quote: bool,
    pub batch_quote: bool,
    pub earnings: bool,
    pub dividends: bool,
}

impl CapabilitySet {
    pub const fn full() -> Self {
        Self {
            daily_series: true,
            live_quote: true,
            batch_quote: true,
            earnings: true,
            dividends: true,
        }
    }

    pub const fn series_only() -> Self {
        Self {
            daily_series: true,
            live_quote: false,
            batch_quote: false,
            earnings: false,
            dividends: false,
        }
    }

    pub const fn with(mut self, endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::DailySeries => self.daily_series = true,
            Endpoint::LiveQuote => self.live_quote = true,
            Endpoint::BatchQuote => self.batch_quote = true,
            Endpoint::Earnings => self.earnings = true,
            Endpoint::Dividends => self.dividends = true,
        }
        self
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::DailySeries => self.daily_series,
            Endpoint::LiveQuote => self.live_quote,
            Endpoint::BatchQuote => self.batch_quote,
            Endpoint::Earnings => self.earnings,
            Endpoint::Dividends => self.dividends,
        }
    }
}

/// Health state used by the registry to skip sources with an open breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Runtime source health snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub consecutive_failures: u32,
}

impl HealthStatus {
    pub const fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            consecutive_failures: 0,
        }
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    UnsupportedEndpoint,
    NotRegistered,
    Unavailable,
    RateLimited,
    Malformed,
    NoData,
    InvalidRequest,
    Internal,
}

/// Structured source error preserved in resolver attempt logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unsupported_endpoint(endpoint: Endpoint) -> Self {
        Self {
            kind: SourceErrorKind::UnsupportedEndpoint,
            message: format!("endpoint '{endpoint}' is not supported by this source"),
            retryable: false,
        }
    }

    pub fn not_registered(provider: ProviderId) -> Self {
        Self {
            kind: SourceErrorKind::NotRegistered,
            message: format!("source '{provider}' is not configured"),
            retryable: false,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NoData,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn is_rate_limited(&self) -> bool {
        matches!(self.kind, SourceErrorKind::RateLimited)
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::UnsupportedEndpoint => "source.unsupported_endpoint",
            SourceErrorKind::NotRegistered => "source.not_registered",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::NoData => "source.no_data",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Request payload for daily series endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub symbol: Symbol,
    /// Minimum number of bars wanted. Adapters may ask upstream for more.
    pub min_bars: usize,
}

impl SeriesRequest {
    pub fn new(symbol: Symbol, min_bars: usize) -> Result<Self, SourceError> {
        if min_bars == 0 {
            return Err(SourceError::invalid_request(
                "series request must ask for at least one bar",
            ));
        }
        Ok(Self { symbol, min_bars })
    }
}

/// Source adapter contract.
///
/// Implementations must be `Send + Sync`: a single adapter instance is shared
/// by every concurrent request. Endpoints a provider does not serve keep the
/// default bodies, which report [`SourceErrorKind::UnsupportedEndpoint`].
pub trait DataSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Returns the set of supported endpoints.
    fn capabilities(&self) -> CapabilitySet;

    /// Fetches raw daily closes, oldest first. An empty upstream payload is
    /// reported as [`SourceErrorKind::NoData`], never as an empty `Ok`.
    fn daily_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, Series>;

    fn live_price<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, LivePrice> {
        let _ = symbol;
        Box::pin(async { Err(SourceError::unsupported_endpoint(Endpoint::LiveQuote)) })
    }

    fn batch_quotes<'a>(&'a self, symbols: Vec<Symbol>) -> SourceFuture<'a, Vec<(Symbol, LivePrice)>> {
        let _ = symbols;
        Box::pin(async { Err(SourceError::unsupported_endpoint(Endpoint::BatchQuote)) })
    }

    /// Returns the first earnings date in `from..=to`, if any.
    fn earnings<'a>(&'a self, symbol: Symbol, from: Date, to: Date) -> SourceFuture<'a, Option<Date>> {
        let _ = (symbol, from, to);
        Box::pin(async { Err(SourceError::unsupported_endpoint(Endpoint::Earnings)) })
    }

    fn dividends<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, DividendLookup> {
        let _ = symbol;
        Box::pin(async { Err(SourceError::unsupported_endpoint(Endpoint::Dividends)) })
    }

    /// Returns the current health status of this source.
    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>>;
}
