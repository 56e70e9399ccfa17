use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::adapters::{AlphaVantageAdapter, FinnhubAdapter, TwelveDataAdapter, YahooAdapter};
use crate::clock::Clock;
use crate::config::Settings;
use crate::data_source::{DataSource, Endpoint, HealthState, SourceError, SourceFuture};
use crate::http_client::HttpClient;
use crate::provider_policy::ProviderPolicy;
use crate::{AssetClass, ProviderId};

/// Priority-ordered provider chains for each lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverPolicy {
    pub equity_series: Vec<ProviderId>,
    pub crypto_series: Vec<ProviderId>,
    pub live_quote: Vec<ProviderId>,
    pub earnings: Vec<ProviderId>,
    pub dividends: Vec<ProviderId>,
    pub batch_quote: Vec<ProviderId>,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            equity_series: vec![ProviderId::Yahoo, ProviderId::TwelveData, ProviderId::Finnhub],
            crypto_series: vec![ProviderId::TwelveData, ProviderId::Finnhub],
            live_quote: vec![
                ProviderId::Finnhub,
                ProviderId::TwelveData,
                ProviderId::AlphaVantage,
            ],
            earnings: vec![ProviderId::Finnhub],
            dividends: vec![ProviderId::TwelveData],
            batch_quote: vec![ProviderId::TwelveData],
        }
    }
}

impl ResolverPolicy {
    pub fn series_chain(&self, asset_class: AssetClass) -> &[ProviderId] {
        match asset_class {
            AssetClass::Equity => &self.equity_series,
            AssetClass::Crypto => &self.crypto_series,
        }
    }
}

/// One failed provider call, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub provider: ProviderId,
    pub error: SourceError,
}

/// Successful routed call.
#[derive(Debug, Clone)]
pub struct RouteSuccess<T> {
    pub data: T,
    pub selected_source: ProviderId,
    pub attempts: Vec<Attempt>,
    pub latency_ms: u64,
}

/// Failed routed call after exhausting the chain.
#[derive(Debug, Clone)]
pub struct RouteFailure {
    pub attempts: Vec<Attempt>,
    pub latency_ms: u64,
}

impl RouteFailure {
    /// Whether at least one provider refused the call for rate reasons.
    pub fn any_rate_limited(&self) -> bool {
        self.attempts.iter().any(|attempt| attempt.error.is_rate_limited())
    }
}

pub type RouteResult<T> = Result<RouteSuccess<T>, RouteFailure>;

/// Registered adapters, keyed by provider.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: HashMap<ProviderId, Arc<dyn DataSource>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

impl SourceRegistry {
    pub fn new(adapters: Vec<Arc<dyn DataSource>>) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self { adapters }
    }

    /// Registers the adapters that `settings` has credentials for. Yahoo
    /// needs none and is always present.
    pub fn from_settings(
        settings: &Settings,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = |provider| ProviderPolicy::default_for(provider).with_timeout(settings.http_timeout);
        let mut adapters: Vec<Arc<dyn DataSource>> = vec![Arc::new(YahooAdapter::with_policy(
            http_client.clone(),
            policy(ProviderId::Yahoo),
        ))];

        if let Some(key) = &settings.twelvedata_api_key {
            adapters.push(Arc::new(TwelveDataAdapter::with_policy(
                http_client.clone(),
                key.clone(),
                policy(ProviderId::TwelveData),
            )));
        }
        if let Some(key) = &settings.finnhub_api_key {
            adapters.push(Arc::new(FinnhubAdapter::with_policy(
                http_client.clone(),
                key.clone(),
                settings.finnhub_secret.clone(),
                clock,
                policy(ProviderId::Finnhub),
            )));
        }
        if let Some(key) = &settings.alphavantage_api_key {
            adapters.push(Arc::new(AlphaVantageAdapter::with_policy(
                http_client,
                key.clone(),
                policy(ProviderId::AlphaVantage),
            )));
        }

        Self::new(adapters)
    }

    pub fn register(&mut self, adapter: Arc<dyn DataSource>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, provider: ProviderId) -> Option<&Arc<dyn DataSource>> {
        self.adapters.get(&provider)
    }

    pub fn contains(&self, provider: ProviderId) -> bool {
        self.adapters.contains_key(&provider)
    }

    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers = self.adapters.keys().copied().collect::<Vec<_>>();
        providers.sort();
        providers
    }

    /// Checks that a provider can take a call for `endpoint` right now.
    pub async fn admit(
        &self,
        provider: ProviderId,
        endpoint: Endpoint,
    ) -> Result<&dyn DataSource, SourceError> {
        let adapter = self
            .adapters
            .get(&provider)
            .ok_or_else(|| SourceError::not_registered(provider))?;
        if !adapter.capabilities().supports(endpoint) {
            return Err(SourceError::unsupported_endpoint(endpoint));
        }
        if adapter.health().await.state == HealthState::Unhealthy {
            return Err(SourceError::unavailable("source health check reported unhealthy"));
        }
        Ok(adapter.as_ref())
    }

    /// Tries `chain` in order, one provider at a time; the first success wins.
    pub async fn route<T, F>(&self, endpoint: Endpoint, chain: &[ProviderId], mut invoke: F) -> RouteResult<T>
    where
        F: for<'a> FnMut(&'a dyn DataSource) -> SourceFuture<'a, T>,
    {
        let started = Instant::now();
        let mut attempts = Vec::new();

        for provider in dedupe_chain(chain) {
            let outcome = match self.admit(provider, endpoint).await {
                Ok(adapter) => {
                    debug!(provider = %provider, endpoint = %endpoint, "trying provider");
                    invoke(adapter).await
                }
                Err(error) => Err(error),
            };

            match outcome {
                Ok(data) => {
                    return Ok(RouteSuccess {
                        data,
                        selected_source: provider,
                        attempts,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    warn!(
                        provider = %provider,
                        endpoint = %endpoint,
                        code = error.code(),
                        error = error.message(),
                        "provider failed; falling through"
                    );
                    attempts.push(Attempt { provider, error });
                }
            }
        }

        warn!(endpoint = %endpoint, attempts = attempts.len(), "every provider in the chain failed");
        Err(RouteFailure {
            attempts,
            latency_ms: elapsed_ms(started),
        })
    }
}

fn dedupe_chain(chain: &[ProviderId]) -> Vec<ProviderId> {
    let mut seen = HashSet::new();
    chain
        .iter()
        .copied()
        .filter(|provider| seen.insert(*provider))
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
