//! Persistence for the daily price-bar pipelines.
//!
//! Owns the destination tables (`stock_data`, `stock_data_log`), the
//! connections and embedded migrations for both supported backends, the CSV
//! layout both pipelines agree on, and the read-side query helpers.

#![deny(missing_docs)]

pub mod audit;
pub mod csv_format;
pub mod db;
pub mod models;
pub mod partition;
pub mod query;
pub mod schema;
pub mod table_ref;
