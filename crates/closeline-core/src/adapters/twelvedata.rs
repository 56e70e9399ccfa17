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
use crate::{parse_iso_date, DailyBar, DividendLookup, LivePrice, ProviderId, Series, Symbol};

const BASE_URL: &str = "https://api.twelvedata.com";

/// Twelve Data adapter: daily series, quotes, batch quotes and dividends.
pub struct TwelveDataAdapter {
    upstream: Upstream,
    api_key: String,
}

impl TwelveDataAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self::with_policy(http_client, api_key, ProviderPolicy::twelvedata_default())
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

    fn request(&self, path: &str, params: &[(&str, &str)]) -> HttpRequest {
        HttpRequest::get(format!("{BASE_URL}/{path}"))
            .with_query(params)
            .with_query(&[("apikey", self.api_key.as_str())])
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, SourceError> {
        let payload: Value = self.upstream.get_json(self.request(path, params)).await?;
        match status_error(&payload) {
            Some(error) => Err(error),
            None => Ok(payload),
        }
    }

    async fn fetch_series(&self, req: SeriesRequest) -> Result<Series, SourceError> {
        let outputsize = (req.min_bars + 15).max(40).to_string();
        let symbol = provider_symbol(&req.symbol);
        let payload = self
            .get(
                "time_series",
                &[
                    ("symbol", symbol.as_str()),
                    ("interval", "1day"),
                    ("outputsize", outputsize.as_str()),
                    ("order", "ASC"),
                ],
            )
            .await?;

        let values = payload
            .get("values")
            .and_then(Value::as_array)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| SourceError::no_data(format!("twelvedata returned no values for '{}'", req.symbol)))?;

        let bars = values
            .iter()
            .filter_map(|row| {
                let day = text(row.get("datetime")).or_else(|| text(row.get("date")))?;
                let close = number(row.get("close"))?;
                DailyBar::parse(day, close).ok()
            })
            .collect::<Vec<_>>();
        if bars.is_empty() {
            return Err(SourceError::malformed("twelvedata rows carried no usable closes"));
        }

        let mut series = Series::from_bars(req.symbol, bars);
        series.truncate_to_recent(req.min_bars);
        Ok(series)
    }

    async fn fetch_quote(&self, symbol: Symbol) -> Result<LivePrice, SourceError> {
        let provider_symbol = provider_symbol(&symbol);
        let payload = self.get("quote", &[("symbol", provider_symbol.as_str())]).await?;

        let row = if payload.get("close").is_some() {
            &payload
        } else {
            payload
                .get(provider_symbol.as_str())
                .ok_or_else(|| SourceError::malformed("twelvedata quote response not recognized"))?
        };
        parse_quote_row(row)
    }

    async fn fetch_batch(&self, symbols: Vec<Symbol>) -> Result<Vec<(Symbol, LivePrice)>, SourceError> {
        if symbols.is_empty() {
            return Err(SourceError::invalid_request("batch quote needs at least one symbol"));
        }
        let joined = symbols.iter().map(provider_symbol).collect::<Vec<_>>().join(",");
        let payload = self.get("quote", &[("symbol", joined.as_str())]).await?;

        // A single-symbol batch comes back flat rather than keyed.
        if symbols.len() == 1 && payload.get("close").is_some() {
            return Ok(parse_quote_row(&payload)
                .map(|price| vec![(symbols[0].clone(), price)])
                .unwrap_or_default());
        }

        Ok(symbols
            .into_iter()
            .filter_map(|symbol| {
                let row = payload.get(provider_symbol(&symbol).as_str())?;
                let price = parse_quote_row(row).ok()?;
                Some((symbol, price))
            })
            .collect())
    }

    async fn fetch_dividends(&self, symbol: Symbol) -> Result<DividendLookup, SourceError> {
        let provider_symbol = provider_symbol(&symbol);
        let payload: Value = self
            .upstream
            .get_json(self.request("dividends", &[("symbol", provider_symbol.as_str())]))
            .await?;

        if let Some(error) = status_error(&payload) {
            if error.is_rate_limited() {
                return Err(error);
            }
            return Ok(DividendLookup::PlanBlocked {
                message: text(payload.get("message")).map(str::to_owned),
            });
        }

        let Some(latest) = payload
            .get("dividends")
            .and_then(Value::as_array)
            .and_then(|dividends| dividends.first())
        else {
            return Ok(DividendLookup::NoData);
        };

        let ex_date = text(latest.get("ex_date")).and_then(|raw| parse_iso_date(raw).ok());
        match (ex_date, number(latest.get("amount"))) {
            (Some(ex_date), Some(amount)) => Ok(DividendLookup::Found { ex_date, amount }),
            _ => Ok(DividendLookup::Incomplete),
        }
    }
}

impl DataSource for TwelveDataAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::TwelveData
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::series_only()
            .with(Endpoint::LiveQuote)
            .with(Endpoint::BatchQuote)
            .with(Endpoint::Dividends)
    }

    fn daily_series<'a>(&'a self, req: SeriesRequest) -> SourceFuture<'a, Series> {
        Box::pin(self.fetch_series(req))
    }

    fn live_price<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, LivePrice> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn batch_quotes<'a>(&'a self, symbols: Vec<Symbol>) -> SourceFuture<'a, Vec<(Symbol, LivePrice)>> {
        Box::pin(self.fetch_batch(symbols))
    }

    fn dividends<'a>(&'a self, symbol: Symbol) -> SourceFuture<'a, DividendLookup> {
        Box::pin(self.fetch_dividends(symbol))
    }

    fn health<'a>(&'a self) -> Pin<Box<dyn Future<Output = HealthStatus> + Send + 'a>> {
        Box::pin(async move { self.upstream.health() })
    }
}

/// Twelve Data spells crypto pairs `BTC/USD`.
fn provider_symbol(symbol: &Symbol) -> String {
    symbol.as_str().replace('-', "/")
}

/// `{"status": "error", "code": 429, ...}` bodies arrive with HTTP 200.
fn status_error(payload: &Value) -> Option<SourceError> {
    if text(payload.get("status")) != Some("error") {
        return None;
    }
    let message = text(payload.get("message")).unwrap_or("twelvedata status=error");
    let code = payload.get("code").and_then(Value::as_u64);
    Some(if code == Some(429) {
        SourceError::rate_limited(format!("twelvedata: {message}"))
    } else {
        SourceError::unavailable(format!("twelvedata: {message}"))
    })
}

fn parse_quote_row(row: &Value) -> Result<LivePrice, SourceError> {
    let price = number(row.get("close"))
        .ok_or_else(|| SourceError::malformed("twelvedata quote has no close"))?;
    let previous_close = number(row.get("previous_close"));
    LivePrice::new(price, previous_close).map_err(|error| SourceError::malformed(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpResponse, MockHttpClient};
    use time::macros::date;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid")
    }

    fn adapter(client: &Arc<MockHttpClient>) -> TwelveDataAdapter {
        TwelveDataAdapter::new(client.clone(), "td-key")
    }

    #[tokio::test]
    async fn time_series_parses_string_closes_and_skips_bad_rows() {
        let client = Arc::new(MockHttpClient::new().respond(
            "/time_series",
            HttpResponse::ok_json(
                r#"{"meta":{"symbol":"AAPL"},"status":"ok","values":[
                    {"datetime":"2024-01-02","close":"185.64"},
                    {"datetime":"2024-01-03"},
                    {"datetime":"2024-01-04","close":"181.91"}]}"#,
            ),
        ));

        let series = adapter(&client)
            .daily_series(SeriesRequest::new(symbol("AAPL"), 10).expect("request"))
            .await
            .expect("series");

        assert_eq!(series.dates(), vec![date!(2024 - 01 - 02), date!(2024 - 01 - 04)]);
        let url = &client.requests()[0].url;
        assert!(url.contains("outputsize=40"));
        assert!(url.contains("order=ASC"));
        assert!(url.contains("apikey=td-key"));
    }

    #[tokio::test]
    async fn crypto_pairs_use_slash_notation() {
        let client = Arc::new(MockHttpClient::new().respond(
            "/time_series",
            HttpResponse::ok_json(r#"{"values":[{"datetime":"2024-01-06","close":"43000"}]}"#),
        ));

        let series = adapter(&client)
            .daily_series(SeriesRequest::new(symbol("BTC-USD"), 7).expect("request"))
            .await
            .expect("series");

        assert_eq!(series.symbol.as_str(), "BTC-USD");
        assert!(client.requests()[0].url.contains("symbol=BTC%2FUSD"));
    }

    #[tokio::test]
    async fn status_error_with_429_code_is_rate_limited() {
        let client = Arc::new(MockHttpClient::new().respond(
            "/time_series",
            HttpResponse::ok_json(r#"{"status":"error","code":429,"message":"credits exhausted"}"#),
        ));

        let error = adapter(&client)
            .daily_series(SeriesRequest::new(symbol("AAPL"), 5).expect("request"))
            .await
            .expect_err("rate limited");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn quote_accepts_flat_and_keyed_shapes() {
        let client = Arc::new(
            MockHttpClient::new()
                .respond(
                    "symbol=AAPL&",
                    HttpResponse::ok_json(r#"{"close":"190.5","previous_close":"188.0"}"#),
                )
                .respond(
                    "symbol=MSFT&",
                    HttpResponse::ok_json(r#"{"MSFT":{"close":"410.0"}}"#),
                ),
        );
        let adapter = adapter(&client);

        let flat = adapter.live_price(symbol("AAPL")).await.expect("flat");
        let keyed = adapter.live_price(symbol("MSFT")).await.expect("keyed");

        assert_eq!(flat.price, 190.5);
        assert_eq!(flat.previous_close, Some(188.0));
        assert_eq!(keyed.price, 410.0);
        assert_eq!(keyed.previous_close, None);
    }

    #[tokio::test]
    async fn batch_quotes_skip_missing_symbols() {
        let client = Arc::new(MockHttpClient::new().respond(
            "/quote",
            HttpResponse::ok_json(
                r#"{"SPY":{"close":"470.1","previous_close":"468.0"},"XLK":{"close":"n/a"}}"#,
            ),
        ));

        let quotes = adapter(&client)
            .batch_quotes(vec![symbol("SPY"), symbol("XLK"), symbol("XLF")])
            .await
            .expect("batch");

        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].0.as_str(), "SPY");
        assert!(client.requests()[0].url.contains("symbol=SPY%2CXLK%2CXLF"));
    }

    #[tokio::test]
    async fn dividends_map_payloads_to_lookup_outcomes() {
        let client = Arc::new(
            MockHttpClient::new()
                .respond(
                    "symbol=KO&",
                    HttpResponse::ok_json(r#"{"dividends":[{"ex_date":"2024-03-14","amount":0.485}]}"#),
                )
                .respond("symbol=TSLA&", HttpResponse::ok_json(r#"{"dividends":[]}"#))
                .respond(
                    "symbol=T&",
                    HttpResponse::ok_json(r#"{"dividends":[{"ex_date":"2024-01-09"}]}"#),
                )
                .respond(
                    "symbol=IBM&",
                    HttpResponse::ok_json(r#"{"status":"error","code":403,"message":"upgrade plan"}"#),
                ),
        );
        let adapter = adapter(&client);

        assert_eq!(
            adapter.dividends(symbol("KO")).await.expect("found"),
            DividendLookup::Found {
                ex_date: date!(2024 - 03 - 14),
                amount: 0.485
            }
        );
        assert_eq!(adapter.dividends(symbol("TSLA")).await.expect("none"), DividendLookup::NoData);
        assert_eq!(adapter.dividends(symbol("T")).await.expect("partial"), DividendLookup::Incomplete);
        assert_eq!(
            adapter.dividends(symbol("IBM")).await.expect("blocked"),
            DividendLookup::PlanBlocked {
                message: Some(String::from("upgrade plan"))
            }
        );
    }
}
