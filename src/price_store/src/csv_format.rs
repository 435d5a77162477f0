//! The CSV layout shared by the fetcher (writer) and the loader (reader).

use std::io;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::PriceBar;

/// Header row, in column order.
pub const CSV_COLUMNS: [&str; 7] = ["date", "ticker", "open", "high", "low", "close", "volume"];

#[derive(Serialize)]
struct CsvRow<'a> {
    date: NaiveDate,
    ticker: &'a str,
    open: Option<Decimal>,
    high: Option<Decimal>,
    low: Option<Decimal>,
    close: Option<Decimal>,
    volume: Option<i64>,
}

impl<'a> From<&'a PriceBar> for CsvRow<'a> {
    fn from(b: &'a PriceBar) -> Self {
        Self {
            date: b.date,
            ticker: &b.ticker,
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
            volume: b.volume,
        }
    }
}

/// Write the header and one line per bar. Missing values become empty fields.
pub fn write_bars<W: io::Write>(writer: W, bars: &[PriceBar]) -> csv::Result<()> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    w.write_record(CSV_COLUMNS)?;
    for bar in bars {
        w.serialize(CsvRow::from(bar))?;
    }
    w.flush()?;
    Ok(())
}

/// [`write_bars`] into a fresh buffer.
pub fn bars_to_csv(bars: &[PriceBar]) -> csv::Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_bars(&mut buf, bars)?;
    Ok(buf)
}

/// Canonical form of a header cell: BOM and `\r` removed, trimmed, inner
/// spaces turned into `_`, lower-cased. `" Close\r"` becomes `"close"`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .replace('\r', "")
        .trim()
        .replace(' ', "_")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn bar(ticker: &str, open: Option<&str>, volume: Option<i64>) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
            ticker: ticker.into(),
            open: open.map(|v| Decimal::from_str(v).unwrap()),
            high: None,
            low: None,
            close: open.map(|v| Decimal::from_str(v).unwrap()),
            volume,
        }
    }

    #[test]
    fn writes_header_then_rows() {
        let out = bars_to_csv(&[
            bar("AAPL", Some("130.28"), Some(112117500)),
            bar("MSFT", None, None),
        ])
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,ticker,open,high,low,close,volume");
        assert_eq!(lines[1], "2023-01-03,AAPL,130.28,,,130.28,112117500");
        assert_eq!(lines[2], "2023-01-03,MSFT,,,,,");
    }

    #[test]
    fn header_only_for_no_bars() {
        let text = String::from_utf8(bars_to_csv(&[]).unwrap()).unwrap();
        assert_eq!(text, "date,ticker,open,high,low,close,volume\n");
    }

    #[test]
    fn header_cells_are_normalized() {
        assert_eq!(normalize_header("\u{feff}Date"), "date");
        assert_eq!(normalize_header(" Close\r"), "close");
        assert_eq!(normalize_header("Adj Close"), "adj_close");
        assert_eq!(normalize_header("VOLUME\r\n"), "volume");
    }
}
