//! Canonical in-memory representation of a daily bar as returned by a provider.
//!
//! Values stay `f64` here, the way vendors send them. Conversion to the exact
//! decimal [`PriceBar`] stored downstream happens in [`Bar::to_price_bar`].

use std::str::FromStr;

use chrono::NaiveDate;
use price_store::models::PriceBar;
use rust_decimal::Decimal;

/// A single daily bar (OHLCV). Any value may be missing or NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Trading day, in exchange-local time.
    pub date: NaiveDate,

    /// Opening price.
    pub open: Option<f64>,

    /// Highest price of the session.
    pub high: Option<f64>,

    /// Lowest price of the session.
    pub low: Option<f64>,

    /// Closing price.
    pub close: Option<f64>,

    /// Volume traded.
    pub volume: Option<f64>,
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

// Go through the shortest round-trip string so 130.28 stays 130.28.
fn to_decimal(v: Option<f64>) -> Option<Decimal> {
    finite(v).and_then(|x| Decimal::from_str(&x.to_string()).ok())
}

impl Bar {
    /// True when no value is present (all `None` or NaN).
    pub fn is_empty(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .into_iter()
            .all(|v| finite(v).is_none())
    }

    /// The storable form of this bar for `ticker`.
    pub fn to_price_bar(&self, ticker: &str) -> PriceBar {
        PriceBar {
            date: self.date,
            ticker: ticker.to_string(),
            open: to_decimal(self.open),
            high: to_decimal(self.high),
            low: to_decimal(self.low),
            close: to_decimal(self.close),
            volume: finite(self.volume).map(|v| v.round() as i64),
        }
    }
}

/// All bars returned for one symbol.
///
/// A symbol the provider knows nothing about may be absent from the response
/// or present with an empty `bars` vector; callers treat both alike.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "AAPL").
    pub symbol: String,
    /// Daily bars, oldest first.
    pub bars: Vec<Bar>,
}
