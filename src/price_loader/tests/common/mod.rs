#![allow(dead_code)]

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::SqliteConnection;
use price_fetcher::io::LocalStorage;
use price_fetcher::models::bar::{Bar, BarSeries};
use price_fetcher::models::request_params::BarsRequestParams;
use price_fetcher::providers::{DataProvider, ProviderError};
use price_loader::processor::ManifestProcessor;
use price_store::audit::AuditLog;
use price_store::db::{connection, migrate};
use price_store::models::LogEntry;
use price_store::query::PriceQuery;
use shared_utils::config::{DbConfig, StagingMode};
use shared_utils::manifest::ManifestFile;
use tempfile::TempDir;

pub const HEADER: &str = "date,ticker,open,high,low,close,volume\n";

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A migrated SQLite database, a CSV root and a manifest in one temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub csv_root: String,
    pub manifest: ManifestFile,
    pub db: DbConfig,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let csv_root = dir.path().join("csv").to_string_lossy().to_string();
        let manifest = ManifestFile::new(dir.path().join("csv_files.log"));
        let db = DbConfig::sqlite(&dir.path().join("prices.db").to_string_lossy());
        migrate::run_all(&db).unwrap();
        Self {
            dir,
            csv_root,
            manifest,
            db,
        }
    }

    pub fn processor(&self) -> ManifestProcessor {
        ManifestProcessor::new(
            self.db.clone(),
            Box::new(LocalStorage),
            self.manifest.clone(),
            AuditLog::new(self.db.clone()),
            StagingMode::Fixed,
        )
    }

    pub fn conn(&self) -> SqliteConnection {
        connection::connect_sqlite(self.db.expose_url()).unwrap()
    }

    pub fn query(&self) -> PriceQuery {
        PriceQuery::new(self.db.clone()).unwrap()
    }

    /// Write `body` (header included by the caller) as `<csv_root>/<rel>`.
    pub fn write_csv(&self, rel: &str, body: &str) -> String {
        let path = Path::new(&self.csv_root).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path.to_string_lossy().to_string()
    }

    /// A one-row ticker partition for `ticker` on `date`.
    pub fn ticker_file(&self, ticker: &str, date: &str, close: &str) -> String {
        let day = d(date);
        self.write_csv(
            &format!(
                "{}/TICKER_DATA_{ticker}_{}.csv",
                day.format("%Y/%m/%d"),
                day.format("%Y_%m_%d")
            ),
            &format!("{HEADER}{date},{ticker},{close},{close},{close},{close},1000\n"),
        )
    }

    pub fn log(&self) -> Vec<LogEntry> {
        AuditLog::new(self.db.clone()).entries().unwrap()
    }

    pub fn count(&self, step: &str, status: &str) -> usize {
        self.log()
            .iter()
            .filter(|e| e.step == step && e.status == status)
            .count()
    }
}

/// Flat bars for every requested symbol and day.
pub struct FlatProvider;

#[async_trait]
impl DataProvider for FlatProvider {
    async fn fetch_bars(&self, params: &BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        Ok(params
            .symbols
            .iter()
            .map(|symbol| BarSeries {
                symbol: symbol.clone(),
                bars: params
                    .start
                    .iter_days()
                    .take_while(|day| *day < params.end)
                    .map(|date| Bar {
                        date,
                        open: Some(100.5),
                        high: Some(101.25),
                        low: Some(99.75),
                        close: Some(100.0),
                        volume: Some(1_000_000.0),
                    })
                    .collect(),
            })
            .collect())
    }
}
