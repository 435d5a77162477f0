//! Load side of the daily price pipeline: stage each queued CSV into a
//! scratch table, reconcile it against `stock_data` with insert-if-absent
//! semantics, and always drop the scratch table afterwards.

pub mod csv_stage;
pub mod engine;
pub mod processor;
