//! Domain rows shared by both pipelines.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::schema::stock_data_log;

/// One daily OHLCV bar. `(ticker, date)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading day.
    pub date: NaiveDate,
    /// Upper-case symbol.
    pub ticker: String,
    /// Opening price.
    pub open: Option<Decimal>,
    /// Session high.
    pub high: Option<Decimal>,
    /// Session low.
    pub low: Option<Decimal>,
    /// Closing price.
    pub close: Option<Decimal>,
    /// Shares traded.
    pub volume: Option<i64>,
}

impl PriceBar {
    /// True when every value column is missing; such a bar carries no data.
    pub fn is_empty(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
    }
}

/// Pipeline step named in a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A fetch run begins.
    Start,
    /// Trading-day check for one date.
    CheckMarket,
    /// Provider request for one date.
    FetchData,
    /// Per-ticker CSV partition.
    SaveCsvTicker,
    /// Daily roll-up CSV.
    SaveCsv,
    /// One file through the loader.
    LoadCsv,
}

impl Step {
    /// Value stored in the `step` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Start => "START",
            Step::CheckMarket => "CHECK_MARKET",
            Step::FetchData => "FETCH_DATA",
            Step::SaveCsvTicker => "SAVE_CSV_TICKER",
            Step::SaveCsv => "SAVE_CSV",
            Step::LoadCsv => "LOAD_CSV",
        }
    }
}

/// Outcome recorded for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Emitted once when a run starts.
    Start,
    /// The step completed.
    Success,
    /// The step failed; the message says why.
    Fail,
    /// Deliberately not attempted.
    Skip,
}

impl Status {
    /// Value stored in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Start => "START",
            Status::Success => "SUCCESS",
            Status::Fail => "FAIL",
            Status::Skip => "SKIP",
        }
    }
}

/// One append-only audit row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// When the record was produced (UTC).
    pub execution_time: NaiveDateTime,
    /// First date the step covers.
    pub from_date: NaiveDate,
    /// Last date the step covers; equal to `from_date` for single-day events.
    pub to_date: NaiveDate,
    /// One ticker or a comma-joined set.
    pub tickers: String,
    /// Which step.
    pub step: Step,
    /// How it went.
    pub status: Status,
    /// Free text, usually a path or an error.
    pub message: String,
    /// Wall time spent in the step.
    pub duration_seconds: f64,
}

impl LogRecord {
    /// A record for `[from_date, to_date]` stamped with the current time.
    pub fn new(
        step: Step,
        status: Status,
        from_date: NaiveDate,
        to_date: NaiveDate,
        tickers: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            execution_time: Utc::now().naive_utc(),
            from_date,
            to_date,
            tickers: tickers.into(),
            step,
            status,
            message: message.into(),
            duration_seconds: 0.0,
        }
    }

    /// A record about a single date.
    pub fn for_day(
        step: Step,
        status: Status,
        date: NaiveDate,
        tickers: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(step, status, date, date, tickers, message)
    }

    /// Attach the elapsed time of the step.
    pub fn with_duration(mut self, elapsed: std::time::Duration) -> Self {
        self.duration_seconds = elapsed.as_secs_f64();
        self
    }
}

#[derive(Insertable)]
#[diesel(table_name = stock_data_log)]
pub(crate) struct NewLogRow<'a> {
    pub execution_time: NaiveDateTime,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub tickers: &'a str,
    pub step: &'a str,
    pub status: &'a str,
    pub message: &'a str,
    pub duration_seconds: f64,
}

impl<'a> From<&'a LogRecord> for NewLogRow<'a> {
    fn from(r: &'a LogRecord) -> Self {
        Self {
            execution_time: r.execution_time,
            from_date: r.from_date,
            to_date: r.to_date,
            tickers: &r.tickers,
            step: r.step.as_str(),
            status: r.status.as_str(),
            message: &r.message,
            duration_seconds: r.duration_seconds,
        }
    }
}

/// A log row read back from the table.
#[derive(Debug, Clone, Queryable)]
pub struct LogEntry {
    /// Surrogate key, increasing in insertion order.
    pub id: i64,
    /// When the record was produced (UTC).
    pub execution_time: NaiveDateTime,
    /// First date covered.
    pub from_date: NaiveDate,
    /// Last date covered.
    pub to_date: NaiveDate,
    /// Ticker or ticker set.
    pub tickers: String,
    /// Step name, e.g. `LOAD_CSV`.
    pub step: String,
    /// Status name, e.g. `SUCCESS`.
    pub status: String,
    /// Free text.
    pub message: String,
    /// Elapsed seconds.
    pub duration_seconds: f64,
}
