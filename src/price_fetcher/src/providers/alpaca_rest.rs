//! Alpaca market-data REST provider (`/v2/stocks/bars`, daily timeframe).

pub mod params;
pub mod provider;
pub mod response;

pub use params::AlpacaBarsParams;
pub use provider::AlpacaProvider;
