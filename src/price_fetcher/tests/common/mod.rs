#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use price_fetcher::calendar::TradingCalendar;
use price_fetcher::io::LocalStorage;
use price_fetcher::models::bar::{Bar, BarSeries};
use price_fetcher::models::request_params::BarsRequestParams;
use price_fetcher::pipeline::{FetchOptions, Fetcher};
use price_fetcher::providers::{ApiSnafu, DataProvider, ProviderError, ValidationSnafu};
use price_store::audit::AuditLog;
use price_store::db::migrate;
use price_store::models::LogEntry;
use shared_utils::config::{DbConfig, RetryPolicy};
use shared_utils::manifest::ManifestFile;
use tempfile::TempDir;

pub fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[derive(Clone, Copy)]
pub enum Failure {
    Transient,
    Permanent,
}

/// Deterministic bars for every requested symbol and day, with scripted failures.
pub struct StubProvider {
    pub calls: AtomicUsize,
    fail_first: usize,
    failure: Failure,
    empty: HashSet<String>,
}

impl StubProvider {
    pub fn healthy() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first: 0,
            failure: Failure::Transient,
            empty: HashSet::new(),
        }
    }

    pub fn failing(times: usize, failure: Failure) -> Self {
        Self {
            fail_first: times,
            failure,
            ..Self::healthy()
        }
    }

    pub fn without_data_for(symbol: &str) -> Self {
        Self {
            empty: [symbol.to_string()].into_iter().collect(),
            ..Self::healthy()
        }
    }
}

#[async_trait]
impl DataProvider for StubProvider {
    async fn fetch_bars(&self, params: &BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            return match self.failure {
                Failure::Transient => ApiSnafu { status: 503u16, message: "try later" }.fail(),
                Failure::Permanent => ValidationSnafu { message: "bad request" }.fail(),
            };
        }

        Ok(params
            .symbols
            .iter()
            .map(|symbol| {
                let bars = if self.empty.contains(symbol) {
                    vec![Bar {
                        date: params.start,
                        open: Some(f64::NAN),
                        high: None,
                        low: None,
                        close: Some(f64::NAN),
                        volume: None,
                    }]
                } else {
                    params
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
                        .collect()
                };
                BarSeries {
                    symbol: symbol.clone(),
                    bars,
                }
            })
            .collect())
    }
}

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
        let db = DbConfig::sqlite(&dir.path().join("log.db").to_string_lossy());
        migrate::run_all(&db).unwrap();
        Self {
            dir,
            csv_root,
            manifest,
            db,
        }
    }

    pub fn fetcher(&self, provider: StubProvider, rollup: bool) -> Fetcher {
        Fetcher::new(
            Box::new(provider),
            Box::new(LocalStorage),
            TradingCalendar::nyse(),
            self.manifest.clone(),
            AuditLog::new(self.db.clone()),
            FetchOptions {
                csv_root: self.csv_root.clone(),
                retry: RetryPolicy {
                    attempts: 3,
                    delay: Duration::ZERO,
                },
                write_daily_rollup: rollup,
            },
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
