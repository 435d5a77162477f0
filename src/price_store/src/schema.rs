//! Diesel table definitions for the destination and log tables.
//!
//! Staging tables are named at runtime and are addressed through
//! [`TableRef`](crate::table_ref::TableRef) instead.

#![allow(missing_docs)]

diesel::table! {
    stock_data (id) {
        id -> BigInt,
        ticker -> Text,
        date -> Date,
        open -> Nullable<Numeric>,
        high -> Nullable<Numeric>,
        low -> Nullable<Numeric>,
        close -> Nullable<Numeric>,
        volume -> Nullable<BigInt>,
    }
}

diesel::table! {
    stock_data_log (id) {
        id -> BigInt,
        execution_time -> Timestamp,
        from_date -> Date,
        to_date -> Date,
        tickers -> Text,
        step -> Text,
        status -> Text,
        message -> Text,
        duration_seconds -> Double,
    }
}

diesel::allow_tables_to_appear_in_same_query!(stock_data, stock_data_log);
