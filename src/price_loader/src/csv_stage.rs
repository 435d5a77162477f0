//! CSV file → [`StagingBatch`]: header normalization and column mapping.
//!
//! Values are kept verbatim as text and cleaned (`\r`, blanks, casts) in SQL
//! when rows move to the destination. Before that, every non-blank date and
//! value cell is checked here, so a file with an unparseable number or date is
//! rejected the same way on every backend instead of being coerced by a
//! lenient cast.

use std::str::FromStr;

use chrono::NaiveDate;
use price_store::csv_format::{CSV_COLUMNS, normalize_header};
use rust_decimal::Decimal;
use tracing::warn;

use crate::engine::LoadError;

/// Columns that must be present in every file.
pub const REQUIRED_COLUMNS: [&str; 2] = ["ticker", "date"];

/// The rows of one CSV file, in [`CSV_COLUMNS`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingBatch {
    rows: Vec<[Option<String>; CSV_COLUMNS.len()]>,
}

impl StagingBatch {
    pub fn rows(&self) -> &[[Option<String>; CSV_COLUMNS.len()]] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A cell as the move statement will see it: `\r` removed, trimmed, blank
/// meaning NULL.
fn cleaned(raw: &str) -> Option<String> {
    let value = raw.replace('\r', "");
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn is_valid(column: &str, value: &str) -> bool {
    match column {
        "ticker" => true,
        "date" => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        _ => Decimal::from_str(value).is_ok() || Decimal::from_scientific(value).is_ok(),
    }
}

/// Parse a CSV file. Column order in the file does not matter; optional
/// value columns that are absent become NULL, unknown ones are ignored.
pub fn parse_csv(bytes: &[u8]) -> Result<StagingBatch, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();

    // For each destination column, where it sits in the file.
    let positions: Vec<Option<usize>> = CSV_COLUMNS
        .iter()
        .map(|col| headers.iter().position(|h| h == col))
        .collect();

    for required in REQUIRED_COLUMNS {
        let idx = CSV_COLUMNS.iter().position(|c| *c == required);
        if idx.and_then(|i| positions[i]).is_none() {
            return Err(LoadError::MissingColumn(required));
        }
    }

    let unknown: Vec<&str> = headers
        .iter()
        .filter(|h| !h.is_empty() && !CSV_COLUMNS.contains(&h.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        warn!(columns = ?unknown, "ignoring unknown CSV columns");
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row: [Option<String>; CSV_COLUMNS.len()] = std::array::from_fn(|i| {
            positions[i].and_then(|p| record.get(p)).map(str::to_string)
        });

        for (&column, cell) in CSV_COLUMNS.iter().zip(&row) {
            if let Some(value) = cell.as_deref().and_then(cleaned) {
                if !is_valid(column, &value) {
                    return Err(LoadError::BadValue {
                        row: index + 1,
                        column,
                        value,
                    });
                }
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(StagingBatch { rows })
}
