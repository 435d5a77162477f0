//! Fetch side of the daily price pipeline: pull daily bars from a market-data
//! provider, skip non-trading days, write one CSV partition per ticker per day
//! and queue each path in the manifest for the loader.

pub mod calendar;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod tickers;
