use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::New_York;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::models::bar::Bar;

#[derive(Deserialize, Debug)]
pub struct AlpacaBar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: Option<f64>,
    #[serde(rename = "h")]
    pub high: Option<f64>,
    #[serde(rename = "l")]
    pub low: Option<f64>,
    #[serde(rename = "c")]
    pub close: Option<f64>,
    #[serde(rename = "v")]
    pub volume: Option<f64>,
}

impl AlpacaBar {
    /// Daily bars are stamped at exchange midnight; the trading day is the
    /// New York calendar date of that instant.
    pub fn trading_day(&self) -> NaiveDate {
        self.timestamp.with_timezone(&New_York).date_naive()
    }

    pub fn into_bar(self) -> Bar {
        Bar {
            date: self.trading_day(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct AlpacaResponse {
    // `null` when no symbol has data.
    #[serde(default)]
    pub bars: Option<IndexMap<String, Vec<AlpacaBar>>>,
    pub next_page_token: Option<String>,
}
