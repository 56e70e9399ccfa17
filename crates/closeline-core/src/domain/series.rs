use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::{Symbol, ValidationError};

/// Parse a `YYYY-MM-DD` calendar date. Longer inputs such as
/// `2024-01-05 00:00:00` are accepted and truncated to the date part.
pub fn parse_iso_date(input: &str) -> Result<Date, ValidationError> {
    let trimmed = input.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    Date::parse(date_part, format_description!("[year]-[month]-[day]")).map_err(|_| {
        ValidationError::InvalidDate {
            value: input.to_owned(),
        }
    })
}

pub fn format_iso_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| String::from("0000-00-00"))
}

/// Serde adapter for `YYYY-MM-DD` dates.
pub mod iso_date {
    use serde::de::Error as DeError;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_iso_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_iso_date(&value).map_err(D::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = Option::<String>::deserialize(deserializer)?;
            value
                .map(|raw| super::super::parse_iso_date(&raw))
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}

/// One settled daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub close: f64,
}

impl DailyBar {
    pub fn new(date: Date, close: f64) -> Result<Self, ValidationError> {
        if !close.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "close" });
        }
        if close < 0.0 {
            return Err(ValidationError::NegativeValue { field: "close" });
        }
        Ok(Self { date, close })
    }

    pub fn parse(date: &str, close: f64) -> Result<Self, ValidationError> {
        Self::new(parse_iso_date(date)?, close)
    }
}

/// Ordered daily closes for one symbol, oldest first, with strictly
/// increasing unique dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub symbol: Symbol,
    bars: Vec<DailyBar>,
}

impl Series {
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            bars: Vec::new(),
        }
    }

    /// Builds a series from bars in any order. Duplicate dates collapse to
    /// the last occurrence in input order.
    pub fn from_bars(symbol: Symbol, bars: Vec<DailyBar>) -> Self {
        let mut indexed = bars
            .into_iter()
            .filter(|bar| bar.close.is_finite() && bar.close >= 0.0)
            .enumerate()
            .collect::<Vec<_>>();
        indexed.sort_by(|(left_index, left), (right_index, right)| {
            left.date
                .cmp(&right.date)
                .then_with(|| left_index.cmp(right_index))
        });

        let mut bars: Vec<DailyBar> = Vec::with_capacity(indexed.len());
        for (_, bar) in indexed {
            match bars.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => bars.push(bar),
            }
        }

        Self { symbol, bars }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn dates(&self) -> Vec<Date> {
        self.bars.iter().map(|bar| bar.date).collect()
    }

    /// Keeps bars matching the predicate. Order and uniqueness are preserved.
    pub fn retain(&mut self, keep: impl FnMut(&DailyBar) -> bool) {
        self.bars.retain(keep);
    }

    pub fn pop_last(&mut self) -> Option<DailyBar> {
        self.bars.pop()
    }

    /// Keeps only the most recent `count` bars.
    pub fn truncate_to_recent(&mut self, count: usize) {
        if self.bars.len() > count {
            let excess = self.bars.len() - count;
            self.bars.drain(..excess);
        }
    }

    pub fn to_columns(&self) -> SeriesColumns {
        SeriesColumns {
            dates: self.bars.iter().map(|bar| format_iso_date(bar.date)).collect(),
            closes: self.closes(),
        }
    }
}

/// Column-oriented `{dates, closes}` shape handed to chart consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesColumns {
    pub dates: Vec<String>,
    pub closes: Vec<f64>,
}

impl SeriesColumns {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
