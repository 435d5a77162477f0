//! Ticker list file: one symbol per line, blank lines and `#` comments
//! ignored, duplicates dropped keeping first-seen order.

use std::path::Path;

use indexmap::IndexSet;

pub fn parse_tickers(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

pub fn load_tickers(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(parse_tickers(&std::fs::read_to_string(path)?))
}
