use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in priority chains and attempt logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Yahoo,
    TwelveData,
    Finnhub,
    AlphaVantage,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [
        Self::Yahoo,
        Self::TwelveData,
        Self::Finnhub,
        Self::AlphaVantage,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::TwelveData => "twelvedata",
            Self::Finnhub => "finnhub",
            Self::AlphaVantage => "alphavantage",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "twelvedata" | "twelve_data" => Ok(Self::TwelveData),
            "finnhub" => Ok(Self::Finnhub),
            "alphavantage" | "alpha_vantage" => Ok(Self::AlphaVantage),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
