use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::cache::CacheStore;
use crate::clock::{Clock, MarketHours, SystemClock};
use crate::config::Settings;
use crate::feed::{FeedEvent, FeedHandle, QuoteFeed};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::indicators::Indicators;
use crate::reference::ReferenceData;
use crate::resolver::{QuoteResolver, SeriesResolver, StatsAggregator};
use crate::routing::{ResolverPolicy, SourceRegistry};
use crate::{Symbol, ValidationError};

/// Wires every resolver onto one registry, clock and cache.
#[derive(Clone)]
pub struct MarketService {
    series: SeriesResolver,
    quotes: QuoteResolver,
    stats: StatsAggregator,
    reference: ReferenceData,
    indicators: Indicators,
}

impl MarketService {
    /// Live service: reqwest transport, wall clock, settings from the environment.
    pub fn from_env() -> Result<Self, ValidationError> {
        let settings = Settings::from_env()?;
        Ok(Self::new(
            &settings,
            Arc::new(ReqwestHttpClient::new()),
            Arc::new(SystemClock),
        ))
    }

    pub fn new(settings: &Settings, http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        let registry = SourceRegistry::from_settings(settings, http_client, clock.clone());
        Self::from_parts(
            registry,
            ResolverPolicy::default(),
            clock,
            settings.market_hours,
            CacheStore::new(settings.cache_ttl, settings.cache_capacity),
        )
    }

    pub fn from_parts(
        registry: SourceRegistry,
        policy: ResolverPolicy,
        clock: Arc<dyn Clock>,
        market_hours: MarketHours,
        cache: CacheStore,
    ) -> Self {
        let registry = Arc::new(registry);
        let policy = Arc::new(policy);
        let series = SeriesResolver::new(registry.clone(), policy.clone(), clock.clone(), market_hours);
        Self {
            quotes: QuoteResolver::new(series.clone()),
            stats: StatsAggregator::new(series.clone()),
            reference: ReferenceData::new(registry, policy, clock, market_hours, cache.clone()),
            indicators: Indicators::new(series.clone(), cache),
            series,
        }
    }

    pub fn series(&self) -> &SeriesResolver {
        &self.series
    }

    pub fn quotes(&self) -> &QuoteResolver {
        &self.quotes
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn indicators(&self) -> &Indicators {
        &self.indicators
    }

    pub fn feed(&self, symbols: Vec<Symbol>, period: Duration) -> (FeedHandle, mpsc::Receiver<FeedEvent>) {
        QuoteFeed::spawn(self.quotes.clone(), symbols, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::http_client::{HttpResponse, MockHttpClient};
    use crate::ProviderId;
    use time::macros::{date, datetime};

    #[tokio::test]
    async fn keyless_settings_still_resolve_through_yahoo() {
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":-18000},
            "timestamp":[1704810600,1704897000],
            "indicators":{"quote":[{"close":[185.14,186.19]}]}}],"error":null}}"#;
        let http = Arc::new(MockHttpClient::new().respond("/v8/finance/chart/AAPL", HttpResponse::ok_json(body)));
        let service = MarketService::new(
            &Settings::default(),
            http,
            Arc::new(FixedClock::new(datetime!(2024-01-10 22:00 UTC))),
        );

        assert_eq!(service.series().registry().providers(), vec![ProviderId::Yahoo]);

        let quote = service
            .quotes()
            .quote(&Symbol::parse("AAPL").expect("valid"))
            .await
            .expect("quote");

        assert_eq!(quote.last_close, 186.19);
        assert_eq!(quote.last_close_date, date!(2024 - 01 - 10));
        assert_eq!(quote.price_source, None);
    }
}
