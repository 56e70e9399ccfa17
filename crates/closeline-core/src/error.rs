use thiserror::Error;

/// Validation and contract errors exposed by `closeline-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid source '{value}', expected one of yahoo, twelvedata, finnhub, alphavantage")]
    InvalidSource { value: String },

    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("configuration value '{key}' is invalid: '{value}'")]
    InvalidSetting { key: &'static str, value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Resolver-level failure surfaced once every provider in a chain is exhausted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no data available for '{symbol}'")]
    NoDataAvailable { symbol: String },

    #[error("all providers rate limited the request for '{symbol}'")]
    RateLimited { symbol: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ResolveError {
    pub fn no_data(symbol: impl Into<String>) -> Self {
        Self::NoDataAvailable {
            symbol: symbol.into(),
        }
    }

    pub fn rate_limited(symbol: impl Into<String>) -> Self {
        Self::RateLimited {
            symbol: symbol.into(),
        }
    }

    /// HTTP-analogous status for the excluded route layer.
    pub const fn status_hint(&self) -> u16 {
        match self {
            Self::NoDataAvailable { .. } => 502,
            Self::RateLimited { .. } => 503,
            Self::Validation(_) => 400,
        }
    }

    pub const fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::NoDataAvailable { .. } => "resolve.no_data",
            Self::RateLimited { .. } => "resolve.rate_limited",
            Self::Validation(_) => "resolve.validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_the_only_retryable_resolve_error() {
        assert!(ResolveError::rate_limited("AAPL").retryable());
        assert!(!ResolveError::no_data("AAPL").retryable());
        assert!(!ResolveError::from(ValidationError::EmptySymbol).retryable());
    }

    #[test]
    fn status_hints_follow_gateway_semantics() {
        assert_eq!(ResolveError::no_data("ZZZZ").status_hint(), 502);
        assert_eq!(ResolveError::rate_limited("ZZZZ").status_hint(), 503);
        assert_eq!(
            ResolveError::from(ValidationError::EmptySymbol).status_hint(),
            400
        );
    }
}
