use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::series::iso_date;

/// Next scheduled earnings date within the lookahead window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsInfo {
    pub ticker: String,
    #[serde(with = "iso_date::option")]
    pub next_earnings_date: Option<Date>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Raw outcome of a provider dividend lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum DividendLookup {
    Found { ex_date: Date, amount: f64 },
    Incomplete,
    NoData,
    PlanBlocked { message: Option<String> },
}

/// Most recent dividend, or the reason it is unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendInfo {
    pub ticker: String,
    pub available: bool,
    #[serde(with = "iso_date::option")]
    pub ex_dividend_date: Option<Date>,
    pub last_dividend_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DividendInfo {
    pub fn unavailable(ticker: impl Into<String>, reason: &str) -> Self {
        Self {
            ticker: ticker.into(),
            available: false,
            ex_dividend_date: None,
            last_dividend_amount: None,
            reason: Some(reason.to_owned()),
            message: None,
        }
    }

    pub fn from_lookup(ticker: impl Into<String>, lookup: DividendLookup) -> Self {
        let ticker = ticker.into();
        match lookup {
            DividendLookup::Found { ex_date, amount } => Self {
                ticker,
                available: true,
                ex_dividend_date: Some(ex_date),
                last_dividend_amount: Some(amount),
                reason: None,
                message: None,
            },
            DividendLookup::Incomplete => Self::unavailable(ticker, "incomplete"),
            DividendLookup::NoData => Self::unavailable(ticker, "no_data"),
            DividendLookup::PlanBlocked { message } => Self {
                message,
                ..Self::unavailable(ticker, "plan_blocked")
            },
        }
    }
}

/// One market breadth indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreadthEntry {
    pub current_price: f64,
    pub last_close: f64,
    pub change_pct: f64,
}

pub type MarketBreadth = BTreeMap<String, BreadthEntry>;

/// Wilder RSI values, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiSeries {
    pub period: usize,
    pub values: Vec<f64>,
}
