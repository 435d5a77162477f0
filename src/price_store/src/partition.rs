//! Deterministic CSV partition names.
//!
//! ```text
//! <root>/YYYY/MM/DD/TICKER_DATA_<TICKER>_YYYY_MM_DD.csv     per ticker, per day
//! <root>/YYYY/MM/date_data/ALL_DATA_YYYY_MM_DD.csv          optional daily roll-up
//! ```
//!
//! The loader derives `(ticker, date)` back from the file name, so parsing
//! must accept everything building produces, including tickers that contain
//! `_` (`BRK_B`).

use chrono::NaiveDate;
use thiserror::Error;

const TICKER_PREFIX: &str = "TICKER_DATA_";
const DAILY_PREFIX: &str = "ALL_DATA_";
const EXTENSION: &str = ".csv";
const DATE_FMT: &str = "%Y_%m_%d";
// "YYYY_MM_DD"
const DATE_LEN: usize = 10;

/// A file name that is not a partition this pipeline writes.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{name}` is not a partition file name: {reason}")]
pub struct PartitionNameError {
    /// The offending file name.
    pub name: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

/// Identity of one CSV partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    /// Bars of one ticker on one day.
    Ticker {
        /// Symbol.
        ticker: String,
        /// Trading day.
        date: NaiveDate,
    },
    /// Every ticker's bars on one day.
    Daily {
        /// Trading day.
        date: NaiveDate,
    },
}

impl PartitionKey {
    /// Per-ticker partition.
    pub fn ticker(ticker: impl Into<String>, date: NaiveDate) -> Self {
        Self::Ticker {
            ticker: ticker.into(),
            date,
        }
    }

    /// Daily roll-up partition.
    pub fn daily(date: NaiveDate) -> Self {
        Self::Daily { date }
    }

    /// The day the partition covers.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Ticker { date, .. } | Self::Daily { date } => *date,
        }
    }

    /// The ticker, for per-ticker partitions.
    pub fn ticker_symbol(&self) -> Option<&str> {
        match self {
            Self::Ticker { ticker, .. } => Some(ticker),
            Self::Daily { .. } => None,
        }
    }

    /// Bare file name.
    pub fn file_name(&self) -> String {
        match self {
            Self::Ticker { ticker, date } => {
                format!("{TICKER_PREFIX}{ticker}_{}{EXTENSION}", date.format(DATE_FMT))
            }
            Self::Daily { date } => format!("{DAILY_PREFIX}{}{EXTENSION}", date.format(DATE_FMT)),
        }
    }

    /// Directory relative to the CSV root.
    pub fn relative_dir(&self) -> String {
        match self {
            Self::Ticker { date, .. } => date.format("%Y/%m/%d").to_string(),
            Self::Daily { date } => format!("{}/date_data", date.format("%Y/%m")),
        }
    }

    /// Full path under `root`, `/`-separated so it works for local disk and HDFS.
    pub fn path_under(&self, root: &str) -> String {
        let root = root.trim_end_matches('/');
        format!("{root}/{}/{}", self.relative_dir(), self.file_name())
    }

    /// Parse a bare file name produced by [`PartitionKey::file_name`].
    pub fn parse_file_name(name: &str) -> Result<Self, PartitionNameError> {
        let err = |reason| PartitionNameError {
            name: name.to_string(),
            reason,
        };

        let stem = name
            .strip_suffix(EXTENSION)
            .ok_or_else(|| err("missing .csv extension"))?;

        let parse_date = |s: &str| {
            NaiveDate::parse_from_str(s, DATE_FMT).map_err(|_| err("bad YYYY_MM_DD date"))
        };

        if let Some(rest) = stem.strip_prefix(TICKER_PREFIX) {
            if rest.len() < DATE_LEN + 2 || !rest.is_char_boundary(rest.len() - DATE_LEN) {
                return Err(err("missing ticker or date"));
            }
            let (head, date) = rest.split_at(rest.len() - DATE_LEN);
            let ticker = head
                .strip_suffix('_')
                .filter(|t| !t.is_empty())
                .ok_or_else(|| err("missing ticker"))?;
            return Ok(Self::ticker(ticker, parse_date(date)?));
        }

        if let Some(date) = stem.strip_prefix(DAILY_PREFIX) {
            return Ok(Self::daily(parse_date(date)?));
        }

        Err(err("unknown prefix"))
    }

    /// Parse the last component of a local or HDFS path.
    pub fn from_path(path: &str) -> Result<Self, PartitionNameError> {
        let name = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
        Self::parse_file_name(name)
    }
}
