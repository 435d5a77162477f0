use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::providers::alpaca_rest::params::AlpacaBarsParams;

/// Vendor-agnostic request for daily bars.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// Symbols to request, in caller order (e.g. `["AAPL", "MSFT"]`).
    pub symbols: Vec<String>,

    /// First trading day wanted (inclusive).
    pub start: NaiveDate,

    /// End of the range (exclusive). Providers with inclusive end dates
    /// translate this themselves.
    pub end: NaiveDate,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequestParams {
    /// Request for exactly one day, `[day, day + 1)`.
    pub fn single_day(symbols: &[String], day: NaiveDate) -> Self {
        Self {
            symbols: symbols.to_vec(),
            start: day,
            end: day + chrono::Days::new(1),
            provider_specific: ProviderParams::None,
        }
    }
}

/// Per-request options for a particular provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
}
