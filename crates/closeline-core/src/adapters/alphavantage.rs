use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::{number, text, Upstream};
use crate::data_source::{
    CapabilitySet, DataSource, Endpoint, HealthStatus, SeriesRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{DailyBar, LivePrice, ProviderId, Series, Symbol};

const QUERY_URL: &str = "https://www.alphavantage.co/query";
const COMPACT_SIZE: usize = 100;

/// Alpha Vantage adapter: daily series and global quotes.
pub struct AlphaVantageAdapter {
    upstream: Upstream,
    api_key: String,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, ProviderPolicy::alphavantage_default())
    }

    pub fn with_policy(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: ProviderPolicy,
    ) -> Self {
        Self {
            upstream: Upstream::new(http_client, policy),
            api_key: api_key.into(),
        }
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value, SourceError> {
        let request = HttpRequest::get(QUERY_URL)
            .with_query(params)
            .with_query(&[("apikey", self.api_key.as_str())]);
        let payload: Value = self.upstream.get_json(request).await?;
        match payload_error(&payload) {
            Some(error) => Err(error),
            None => Ok(payload),
        }
    }

    async fn fetch_series(&self, req: SeriesRequest) -> Result<Series, SourceError> {
        let outputsize = if req.min_bars + 15 > COMPACT_SIZE { "full" } else { "compact" };
        let payload = self
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", req.symbol.as_str()),
                ("outputsize", outputsize),
            ])
            .await?;

        let rows = payload
            .get("Time Series (Daily)")
            .and_then(Value::as_object)
            .filter(|rows| !rows.is_empty())
            .ok_or_else(|| SourceError::no_data(format!("alphavantage returned no series for '{}'", req.symbol)))?;

        // Keys are dates, newest first; Series::from_bars restores the order.
        let bars = rows
            .iter()
            .filter_map(|(day, row)| DailyBar::parse(day, number(row.get("4. close"))?).ok())
            .collect::<Vec<_>>();
        if bars.is_empty() {
            return Err(SourceError::malformed("alphavantage rows carried no usable closes"));
        }

        let mut series = Series::from_bars(req.symbol, bars);
        series.truncate_to_recent(req.min_bars);
        Ok(series)
    }

    async fn fetch_quote(&self, symbol: Symbol) -> Result<LivePrice, SourceError> {
        let payload = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol.as_str())])
            .await?;

        let quote = payload
            .get("Global Quote")
            .and_then(Value::as_object)
            .filter(|quote| !quote.is_empty())
            .ok_or_else(|| SourceError::no_data(format!("alphavantage has no quote for '{symbol}'")))?;
        let price = number(quote.get("05. price"))
            .ok_or_else(|| SourceError::malformed("alphavantage quote has no '05. price'"))?;
        let previous_close = number(quote.get("08. previous close"));
        LivePrice::new(price, previous_close).map_err(|error| SourceError::malformed(error.to_string()))
    }
}

impl DataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::AlphaVantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::series_only().with(Endpoint::LiveQuote)
    }

    fn daily_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, Series> {
        Box::pin(self.fetch_series(req))
    }

    fn live_price<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, LivePrice> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { self.upstream.health() })
    }
}

/// Throttled responses arrive as HTTP 200 with a `Note` or `Information` body.
fn payload_error(payload: &Value) -> Option<SourceError> {
    if let Some(note) = text(payload.get("Note")).or_else(|| text(payload.get("Information"))) {
        return Some(SourceError::rate_limited(format!("alphavantage: {note}")));
    }
    text(payload.get("Error Message"))
        .map(|message| SourceError::no_data(format!("alphavantage: {message}")))
}
