use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::series::iso_date;
use crate::{ProviderId, Symbol, ValidationError};

/// Best-effort live price reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivePrice {
    pub price: f64,
    /// Provider's own previous close. Never used for `Quote::last_close`.
    pub previous_close: Option<f64>,
}

impl LivePrice {
    pub fn new(price: f64, previous_close: Option<f64>) -> Result<Self, ValidationError> {
        validate_price("price", price)?;
        if let Some(previous_close) = previous_close {
            validate_price("previous_close", previous_close)?;
        }
        Ok(Self {
            price,
            previous_close,
        })
    }
}

/// Quote whose last close is pinned to the final bar of the canonical series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub last_close: f64,
    #[serde(with = "iso_date")]
    pub last_close_date: Date,
    pub current_price: f64,
    pub change_pct: f64,
    /// Provider that supplied `current_price`; absent when it fell back to
    /// the last close.
    pub price_source: Option<ProviderId>,
}

/// Percent change rounded to 2 decimals; `0.0` when the base is zero.
pub fn change_pct(current: f64, base: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    round_to(((current - base) / base) * 100.0, 2)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// 52-week range; both fields are `None` when no bars are available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats52w {
    pub high: Option<f64>,
    pub low: Option<f64>,
}

fn validate_price(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
