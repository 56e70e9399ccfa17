use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::Upstream;
use crate::data_source::{CapabilitySet, DataSource, HealthStatus, SeriesRequest, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::{DailyBar, ProviderId, Series, Symbol};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart adapter. Anonymous access, daily series only.
pub struct YahooAdapter {
    upstream: Upstream,
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_policy(http_client, ProviderPolicy::yahoo_default())
    }

    pub fn with_policy(http_client: Arc<dyn HttpClient>, policy: ProviderPolicy) -> Self {
        Self {
            upstream: Upstream::new(http_client, policy),
        }
    }

    fn chart_request(symbol: &Symbol, min_bars: usize) -> HttpRequest {
        let range = format!("{}d", (min_bars + 15).max(25));
        HttpRequest::get(format!(
            "{CHART_URL}/{}",
            urlencoding::encode(symbol.as_str())
        ))
        .with_query(&[("range", range.as_str()), ("interval", "1d")])
    }

    async fn fetch_series(&self, req: SeriesRequest) -> Result<Series, SourceError> {
        let response: YahooChartResponse = self
            .upstream
            .get_json(Self::chart_request(&req.symbol, req.min_bars))
            .await?;
        let mut series = parse_chart(req.symbol, response)?;
        series.truncate_to_recent(req.min_bars);
        Ok(series)
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::series_only()
    }

    fn daily_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, Series> {
        Box::pin(self.fetch_series(req))
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { self.upstream.health() })
    }
}

fn parse_chart(symbol: Symbol, response: YahooChartResponse) -> Result<Series, SourceError> {
    if let Some(error) = response.chart.error.filter(|error| !error.is_null()) {
        return Err(SourceError::unavailable(format!("yahoo chart API error: {error}")));
    }

    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| SourceError::no_data("no chart data in yahoo response"))?;
    let timestamps = result
        .timestamp
        .ok_or_else(|| SourceError::no_data("yahoo chart has no timestamps"))?;
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|quote| quote.close)
        .ok_or_else(|| SourceError::malformed("yahoo chart has no quote indicator"))?;
    let gmt_offset = result.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (timestamp, close) in timestamps.into_iter().zip(closes) {
        let Some(close) = close else { continue };
        let local = OffsetDateTime::from_unix_timestamp(timestamp + gmt_offset)
            .map_err(|error| SourceError::malformed(format!("invalid yahoo timestamp: {error}")))?;
        if let Ok(bar) = DailyBar::new(local.date(), close) {
            bars.push(bar);
        }
    }

    if bars.is_empty() {
        return Err(SourceError::no_data(format!("yahoo returned no closes for '{symbol}'")));
    }
    Ok(Series::from_bars(symbol, bars))
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Option<YahooMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct YahooChartIndicators {
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpResponse, MockHttpClient};
    use time::macros::date;

    // 2024-01-02 14:30 UTC, 2024-01-03 14:30 UTC, 2024-01-04 14:30 UTC.
    const CHART: &str = r#"{"chart":{"result":[{"meta":{"gmtoffset":-18000},
        "timestamp":[1704205800,1704292200,1704378600],
        "indicators":{"quote":[{"close":[185.64,null,181.91]}]}}],"error":null}}"#;

    fn adapter(client: Arc<MockHttpClient>) -> YahooAdapter {
        YahooAdapter::new(client)
    }

    #[tokio::test]
    async fn parses_chart_and_skips_null_closes() {
        let client = Arc::new(MockHttpClient::new().respond("/chart/AAPL", HttpResponse::ok_json(CHART)));
        let adapter = adapter(client.clone());

        let series = adapter
            .daily_series(SeriesRequest::new(Symbol::parse("AAPL").expect("valid"), 10).expect("request"))
            .await
            .expect("series");

        assert_eq!(series.dates(), vec![date!(2024 - 01 - 02), date!(2024 - 01 - 04)]);
        assert_eq!(series.closes(), vec![185.64, 181.91]);

        let url = &client.requests()[0].url;
        assert!(url.contains("range=25d"));
        assert!(url.contains("interval=1d"));
    }

    #[tokio::test]
    async fn buffer_grows_with_requested_window() {
        let client = Arc::new(MockHttpClient::new().respond("/chart/", HttpResponse::ok_json(CHART)));
        let adapter = adapter(client.clone());

        let _ = adapter
            .daily_series(SeriesRequest::new(Symbol::parse("MSFT").expect("valid"), 100).expect("request"))
            .await;

        assert!(client.requests()[0].url.contains("range=115d"));
    }

    #[tokio::test]
    async fn api_error_and_empty_result_are_failures() {
        let client = Arc::new(
            MockHttpClient::new()
                .respond(
                    "/chart/ZZZZ",
                    HttpResponse::ok_json(r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#),
                )
                .respond(
                    "/chart/EMPTY",
                    HttpResponse::ok_json(r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#),
                ),
        );
        let adapter = adapter(client);

        let not_found = adapter
            .daily_series(SeriesRequest::new(Symbol::parse("ZZZZ").expect("valid"), 5).expect("request"))
            .await
            .expect_err("api error");
        let empty = adapter
            .daily_series(SeriesRequest::new(Symbol::parse("EMPTY").expect("valid"), 5).expect("request"))
            .await
            .expect_err("no data");

        assert_eq!(not_found.kind(), SourceErrorKind::Unavailable);
        assert_eq!(empty.kind(), SourceErrorKind::NoData);
    }

    #[tokio::test]
    async fn quote_endpoint_is_unsupported() {
        let adapter = adapter(Arc::new(MockHttpClient::new()));

        let error = adapter
            .live_price(Symbol::parse("AAPL").expect("valid"))
            .await
            .expect_err("series only");

        assert_eq!(error.kind(), SourceErrorKind::UnsupportedEndpoint);
    }
}
