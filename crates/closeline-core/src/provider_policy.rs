use std::time::Duration;

use crate::ProviderId;

/// Per-provider request budget and upstream timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub timeout: Duration,
}

impl ProviderPolicy {
    pub fn yahoo_default() -> Self {
        Self {
            provider_id: ProviderId::Yahoo,
            quota_window: Duration::from_secs(60),
            quota_limit: 100,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn twelvedata_default() -> Self {
        Self {
            provider_id: ProviderId::TwelveData,
            quota_window: Duration::from_secs(60),
            quota_limit: 8,
            timeout: Duration::from_secs(8),
        }
    }

    pub fn finnhub_default() -> Self {
        Self {
            provider_id: ProviderId::Finnhub,
            quota_window: Duration::from_secs(60),
            quota_limit: 60,
            timeout: Duration::from_secs(6),
        }
    }

    pub fn alphavantage_default() -> Self {
        Self {
            provider_id: ProviderId::AlphaVantage,
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
            timeout: Duration::from_secs(8),
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Yahoo => Self::yahoo_default(),
            ProviderId::TwelveData => Self::twelvedata_default(),
            ProviderId::Finnhub => Self::finnhub_default(),
            ProviderId::AlphaVantage => Self::alphavantage_default(),
        }
    }

    /// Overrides the upstream timeout, kept inside the 5-10 second band.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.clamp(Duration::from_secs(5), Duration::from_secs(10));
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
