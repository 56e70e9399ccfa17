//! Core contracts for closeline.
//!
//! This crate contains:
//! - Canonical domain models and validation
//! - Provider adapters behind the `DataSource` trait, with routing
//! - Calendar normalization and canonical series resolution
//! - Quotes, 52-week stats, reference data and indicators derived from it

pub mod adapters;
pub mod cache;
pub mod calendar;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod feed;
pub mod http_client;
pub mod indicators;
pub mod provider_policy;
pub mod reference;
pub mod resolver;
pub mod routing;
pub mod service;
pub mod source;
#[doc(hidden)]
pub mod testing;
pub mod throttling;

pub use adapters::{AlphaVantageAdapter, FinnhubAdapter, TwelveDataAdapter, YahooAdapter};
pub use cache::{CacheKey, CacheMode, CacheStore};
pub use calendar::CalendarNormalizer;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use clock::{Clock, FixedClock, MarketHours, MarketSession, SessionState, SystemClock};
pub use config::Settings;
pub use data_source::{
    CapabilitySet, DataSource, Endpoint, HealthState, HealthStatus, SeriesRequest, SourceError,
    SourceErrorKind,
};
pub use domain::{
    change_pct, format_iso_date, parse_iso_date, round_to, AssetClass, BreadthEntry, DailyBar,
    DividendInfo, DividendLookup, EarningsInfo, LivePrice, MarketBreadth, Quote, RsiSeries,
    Series, SeriesColumns, Stats52w, Symbol,
};
pub use error::{CoreError, ResolveError, ValidationError};
pub use feed::{FeedEvent, FeedHandle, QuoteFeed};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, MockHttpClient,
    ReqwestHttpClient,
};
pub use indicators::Indicators;
pub use provider_policy::ProviderPolicy;
pub use reference::ReferenceData;
pub use resolver::{
    FailedSymbol, FanOutPolicy, FanOutReport, QuoteResolver, Resolution, SeriesResolver,
    StatsAggregator,
};
pub use routing::{Attempt, ResolverPolicy, RouteFailure, RouteResult, RouteSuccess, SourceRegistry};
pub use service::MarketService;
pub use source::ProviderId;
pub use throttling::ThrottlingQueue;
