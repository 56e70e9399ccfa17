//! Runtime settings loaded from the environment.
//!
//! | Setting | Primary Env Var | Fallback Env Var | Default |
//! |---------|-----------------|------------------|---------|
//! | Finnhub key | `CLOSELINE_FINNHUB_API_KEY` | `FINNHUB_API_KEY` | unset |
//! | Finnhub secret | `CLOSELINE_FINNHUB_SECRET` | `FINNHUB_SECRET` | unset |
//! | Twelve Data key | `CLOSELINE_TWELVEDATA_API_KEY` | `TWELVEDATA_API_KEY` | unset |
//! | Alpha Vantage key | `CLOSELINE_ALPHAVANTAGE_API_KEY` | `ALPHAVANTAGE_API_KEY` | unset |
//! | Market UTC offset | `CLOSELINE_MARKET_UTC_OFFSET_HOURS` | `MARKET_UTC_OFFSET_HOURS` | `-5` |
//! | Market close hour | `CLOSELINE_MARKET_CLOSE_HOUR` | `MARKET_CLOSE_HOUR` | `16` |
//! | Cache capacity | `CLOSELINE_CACHE_CAPACITY` | `CACHE_CAPACITY` | `128` |
//! | Cache TTL (s) | `CLOSELINE_CACHE_TTL_SECS` | `CACHE_TTL_SECS` | `120` |
//! | HTTP timeout (ms) | `CLOSELINE_HTTP_TIMEOUT_MS` | `HTTP_TIMEOUT_MS` | `8000` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::clock::MarketHours;
use crate::ValidationError;

const PREFIX: &str = "CLOSELINE_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub finnhub_api_key: Option<String>,
    pub finnhub_secret: Option<String>,
    pub twelvedata_api_key: Option<String>,
    pub alphavantage_api_key: Option<String>,
    pub market_hours: MarketHours,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            finnhub_api_key: None,
            finnhub_secret: None,
            twelvedata_api_key: None,
            alphavantage_api_key: None,
            market_hours: MarketHours::default(),
            cache_capacity: 128,
            cache_ttl: Duration::from_secs(120),
            http_timeout: Duration::from_millis(8_000),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Each key is read
    /// with the `CLOSELINE_` prefix first, then without it. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(&format!("{PREFIX}{key}"))
                .or_else(|| lookup(key))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        let utc_offset: i8 = parse_or(read("MARKET_UTC_OFFSET_HOURS"), "MARKET_UTC_OFFSET_HOURS", -5)?;
        let close_hour: u8 = parse_or(read("MARKET_CLOSE_HOUR"), "MARKET_CLOSE_HOUR", 16)?;
        let cache_capacity = parse_or(read("CACHE_CAPACITY"), "CACHE_CAPACITY", defaults.cache_capacity)?;
        let cache_ttl_secs: u64 = parse_or(read("CACHE_TTL_SECS"), "CACHE_TTL_SECS", 120)?;
        let http_timeout_ms: u64 = parse_or(read("HTTP_TIMEOUT_MS"), "HTTP_TIMEOUT_MS", 8_000)?;

        Ok(Self {
            finnhub_api_key: read("FINNHUB_API_KEY"),
            finnhub_secret: read("FINNHUB_SECRET"),
            twelvedata_api_key: read("TWELVEDATA_API_KEY"),
            alphavantage_api_key: read("ALPHAVANTAGE_API_KEY"),
            market_hours: MarketHours::new(utc_offset, close_hour)?,
            cache_capacity,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            http_timeout: Duration::from_millis(http_timeout_ms.clamp(5_000, 10_000)),
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ValidationError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ValidationError::InvalidSetting { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn prefixed_variable_wins_over_fallback() {
        let settings = Settings::from_lookup(lookup(&[
            ("CLOSELINE_FINNHUB_API_KEY", "primary"),
            ("FINNHUB_API_KEY", "fallback"),
            ("TWELVEDATA_API_KEY", "td"),
            ("ALPHAVANTAGE_API_KEY", "  "),
        ]))
        .expect("settings");

        assert_eq!(settings.finnhub_api_key.as_deref(), Some("primary"));
        assert_eq!(settings.twelvedata_api_key.as_deref(), Some("td"));
        assert_eq!(settings.alphavantage_api_key, None);
    }

    #[test]
    fn http_timeout_is_clamped() {
        let settings =
            Settings::from_lookup(lookup(&[("HTTP_TIMEOUT_MS", "60000")])).expect("settings");
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn unparsable_values_are_rejected() {
        let error = Settings::from_lookup(lookup(&[("CLOSELINE_CACHE_CAPACITY", "lots")]))
            .expect_err("must fail");

        assert_eq!(
            error,
            ValidationError::InvalidSetting {
                key: "CACHE_CAPACITY",
                value: String::from("lots"),
            }
        );
    }
}
