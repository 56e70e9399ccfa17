//! Provider adapters.
//!
//! Every adapter sends its calls through [`Upstream`], which applies the
//! circuit breaker, the local rate budget, the provider timeout, and the
//! shared status mapping. 429 is `RateLimited` and 5xx is `Unavailable`.
//! 404 is `NoData` and other 4xx are `InvalidRequest`; neither counts
//! against the breaker. Undecodable bodies are `Malformed`.

mod alphavantage;
mod finnhub;
mod twelvedata;
mod yahoo;

pub use alphavantage::AlphaVantageAdapter;
pub use finnhub::FinnhubAdapter;
pub use twelvedata::TwelveDataAdapter;
pub use yahoo::YahooAdapter;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::data_source::{HealthState, HealthStatus, SourceError};
use crate::http_client::{HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::ThrottlingQueue;
use crate::ProviderId;

pub(crate) struct Upstream {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    policy: ProviderPolicy,
    circuit_breaker: CircuitBreaker,
    throttling: ThrottlingQueue,
}

impl Upstream {
    pub(crate) fn new(http_client: Arc<dyn HttpClient>, policy: ProviderPolicy) -> Self {
        Self {
            provider: policy.provider_id,
            throttling: ThrottlingQueue::from_policy(&policy),
            circuit_breaker: CircuitBreaker::default(),
            http_client,
            policy,
        }
    }

    /// Performs a guarded GET and decodes the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, SourceError> {
        let provider = self.provider;
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(format!(
                "{provider} circuit breaker is open; skipping upstream call"
            )));
        }

        if let Err(delay) = self.throttling.acquire() {
            return Err(SourceError::rate_limited(format!(
                "{provider} request budget exhausted; retry in {:.2}s",
                delay.as_secs_f64()
            )));
        }

        let request = request.with_timeout_ms(self.policy.timeout_ms());
        debug!(provider = %provider, "upstream request");
        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            if error.timed_out() {
                SourceError::unavailable(format!("{provider} timed out: {}", error.message()))
            } else {
                SourceError::unavailable(format!("{provider} transport error: {}", error.message()))
            }
        })?;

        if response.is_rate_limited() {
            return Err(SourceError::rate_limited(format!(
                "{provider} returned HTTP 429"
            )));
        }
        if response.is_server_error() {
            self.circuit_breaker.record_failure();
            return Err(SourceError::unavailable(format!(
                "{provider} returned status {}",
                response.status
            )));
        }
        // A client error is still a healthy answer from the upstream.
        self.circuit_breaker.record_success();
        if response.status == 404 {
            return Err(SourceError::no_data(format!("{provider} returned HTTP 404")));
        }
        if !response.is_success() {
            return Err(SourceError::invalid_request(format!(
                "{provider} rejected the request with status {}",
                response.status
            )));
        }

        serde_json::from_str(&response.body).map_err(|error| {
            SourceError::malformed(format!("failed to parse {provider} response: {error}"))
        })
    }

    pub(crate) fn health(&self) -> HealthStatus {
        let state = match self.circuit_breaker.effective_state() {
            CircuitState::Open => HealthState::Unhealthy,
            CircuitState::HalfOpen => HealthState::Degraded,
            CircuitState::Closed if self.circuit_breaker.consecutive_failures() > 0 => {
                HealthState::Degraded
            }
            CircuitState::Closed => HealthState::Healthy,
        };
        HealthStatus {
            state,
            consecutive_failures: self.circuit_breaker.consecutive_failures(),
        }
    }
}

/// Reads a price that providers send either as a JSON number or a string.
pub(crate) fn number(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|parsed| parsed.is_finite())
}

pub(crate) fn text(value: Option<&Value>) -> Option<&str> {
    value?.as_str().map(str::trim).filter(|text| !text.is_empty())
}
