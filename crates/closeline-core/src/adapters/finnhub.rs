use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use time::{Date, Duration, OffsetDateTime};

use super::Upstream;
use crate::clock::Clock;
use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, HealthStatus, SeriesRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{format_iso_date, parse_iso_date, DailyBar, LivePrice, ProviderId, Series, Symbol};

const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Finnhub adapter: daily candles, quotes and the earnings calendar.
pub struct FinnhubAdapter {
    upstream: Upstream,
    token: String,
    secret: HttpAuth,
    clock: Arc<dyn Clock>,
}

impl FinnhubAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        token: impl Into<String>,
        secret: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_policy(http_client, token, secret, clock, ProviderPolicy::finnhub_default())
    }

    pub fn with_policy(
        http_client: Arc<dyn HttpClient>,
        token: impl Into<String>,
        secret: Option<String>,
        clock: Arc<dyn Clock>,
        policy: ProviderPolicy,
    ) -> Self {
        let secret = match secret {
            Some(value) => HttpAuth::Header {
                name: String::from("X-Finnhub-Secret"),
                value,
            },
            None => HttpAuth::None,
        };
        Self {
            upstream: Upstream::new(http_client, policy),
            token: token.into(),
            secret,
            clock,
        }
    }

    fn request(&self, path: &str, params: &[(&str, &str)]) -> HttpRequest {
        HttpRequest::get(format!("{BASE_URL}/{path}"))
            .with_query(params)
            .with_query(&[("token", self.token.as_str())])
            .with_auth(&self.secret)
    }

    async fn fetch_series(&self, req: SeriesRequest) -> Result<Series, SourceError> {
        let now = self.clock.now();
        let lookback_days = i64::try_from(req.min_bars).unwrap_or(i64::MAX / 4).saturating_mul(3);
        let from = (now - Duration::days(lookback_days)).unix_timestamp().to_string();
        let to = now.unix_timestamp().to_string();

        let candles: FinnhubCandles = self
            .upstream
            .get_json(self.request(
                "stock/candle",
                &[
                    ("symbol", req.symbol.as_str()),
                    ("resolution", "D"),
                    ("from", from.as_str()),
                    ("to", to.as_str()),
                ],
            ))
            .await?;

        if candles.status.as_deref() != Some("ok") {
            return Err(SourceError::no_data(format!(
                "finnhub candle status '{}' for '{}'",
                candles.status.as_deref().unwrap_or("missing"),
                req.symbol
            )));
        }
        let (Some(timestamps), Some(closes)) = (candles.timestamps, candles.closes) else {
            return Err(SourceError::malformed("finnhub candles lack 't' or 'c' arrays"));
        };

        let mut bars = Vec::with_capacity(timestamps.len());
        for (timestamp, close) in timestamps.into_iter().zip(closes) {
            let Some(close) = close else { continue };
            let day = OffsetDateTime::from_unix_timestamp(timestamp)
                .map_err(|error| SourceError::malformed(format!("invalid finnhub timestamp: {error}")))?
                .date();
            if let Ok(bar) = DailyBar::new(day, close) {
                bars.push(bar);
            }
        }
        if bars.is_empty() {
            return Err(SourceError::no_data(format!("finnhub returned no closes for '{}'", req.symbol)));
        }

        let mut series = Series::from_bars(req.symbol, bars);
        series.truncate_to_recent(req.min_bars);
        Ok(series)
    }

    async fn fetch_quote(&self, symbol: Symbol) -> Result<LivePrice, SourceError> {
        let quote: FinnhubQuote = self
            .upstream
            .get_json(self.request("quote", &[("symbol", symbol.as_str())]))
            .await?;

        // Unknown symbols come back as all-zero quotes.
        let price = quote
            .current
            .filter(|price| *price > 0.0)
            .ok_or_else(|| SourceError::no_data(format!("finnhub has no quote for '{symbol}'")))?;
        let previous_close = quote.previous_close.filter(|close| *close > 0.0);
        LivePrice::new(price, previous_close).map_err(|error| SourceError::malformed(error.to_string()))
    }

    async fn fetch_earnings(&self, symbol: Symbol, from: Date, to: Date) -> Result<Option<Date>, SourceError> {
        let from_param = format_iso_date(from);
        let to_param = format_iso_date(to);
        let calendar: FinnhubEarningsCalendar = self
            .upstream
            .get_json(self.request(
                "calendar/earnings",
                &[
                    ("symbol", symbol.as_str()),
                    ("from", from_param.as_str()),
                    ("to", to_param.as_str()),
                ],
            ))
            .await?;

        Ok(calendar
            .earnings_calendar
            .iter()
            .filter_map(|entry| entry.date.as_deref())
            .filter_map(|raw| parse_iso_date(raw).ok())
            .filter(|date| (from..=to).contains(date))
            .min())
    }
}

impl DataSource for FinnhubAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::series_only()
            .with(Endpoint::LiveQuote)
            .with(Endpoint::Earnings)
    }

    fn daily_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, Series> {
        Box::pin(self.fetch_series(req))
    }

    fn live_price<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, LivePrice> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn earnings<'a>(&'a self, symbol: Symbol, from: Date, to: Date) -> SourceFuture<'a, Option<Date>> {
        Box::pin(self.fetch_earnings(symbol, from, to))
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { self.upstream.health() })
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubCandles {
    #[serde(rename = "s")]
    status: Option<String>,
    #[serde(rename = "t", default)]
    timestamps: Option<Vec<i64>>,
    #[serde(rename = "c", default)]
    closes: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    #[serde(rename = "c")]
    current: Option<f64>,
    #[serde(rename = "pc")]
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FinnhubEarningsCalendar {
    #[serde(rename = "earningsCalendar", default)]
    earnings_calendar: Vec<FinnhubEarningsEntry>,
}

#[derive(Debug, Deserialize)]
struct FinnhubEarningsEntry {
    date: Option<String>,
}
