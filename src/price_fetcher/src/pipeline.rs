//! The fetch run: per trading day, one provider request for the whole ticker
//! set, one CSV partition per ticker, one manifest line per partition and an
//! audit record for every step.

use std::time::Instant;

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use price_store::audit::AuditLog;
use price_store::csv_format::bars_to_csv;
use price_store::models::{LogRecord, PriceBar, Status, Step};
use price_store::partition::PartitionKey;
use shared_utils::config::{AppConfig, RetryPolicy};
use shared_utils::manifest::ManifestFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::calendar::TradingCalendar;
use crate::io::storage::Storage;
use crate::models::bar::BarSeries;
use crate::models::request_params::BarsRequestParams;
use crate::providers::{DataProvider, ProviderError};

/// Inputs that make a run impossible before anything is fetched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("no tickers to fetch")]
    NoTickers,
    #[error("empty date range [{from}, {to})")]
    EmptyRange { from: NaiveDate, to: NaiveDate },
    #[error("only the end date was given")]
    MissingFrom,
}

/// Run-level knobs.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Root of the date-structured partition tree.
    pub csv_root: String,
    pub retry: RetryPolicy,
    /// Also write `ALL_DATA_<date>.csv` per day.
    pub write_daily_rollup: bool,
}

impl FetchOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            csv_root: config.csv_root.clone(),
            retry: config.retry,
            write_daily_rollup: config.write_daily_rollup,
        }
    }
}

/// What a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// Trading days for which at least one partition was attempted.
    pub days_fetched: usize,
    /// Weekends and holidays.
    pub days_skipped: usize,
    /// Days lost to provider errors or empty responses.
    pub days_failed: usize,
    /// Per-ticker partitions written and queued, in write order.
    pub files_written: Vec<String>,
    /// `(day, ticker)` pairs that produced no partition.
    pub ticker_failures: Vec<(NaiveDate, String)>,
}

/// `[from, to)` from optional CLI dates. Defaults to `[today - 1, today)`;
/// a lone `from` means that single day.
pub fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), FetchError> {
    let (from, to) = match (from, to) {
        (None, None) => (today - Days::new(1), today),
        (Some(from), None) => (from, from + Days::new(1)),
        (Some(from), Some(to)) => (from, to),
        (None, Some(_)) => return Err(FetchError::MissingFrom),
    };
    if from >= to {
        return Err(FetchError::EmptyRange { from, to });
    }
    Ok((from, to))
}

pub struct Fetcher {
    provider: Box<dyn DataProvider>,
    storage: Box<dyn Storage>,
    calendar: TradingCalendar,
    manifest: ManifestFile,
    audit: AuditLog,
    options: FetchOptions,
}

impl Fetcher {
    pub fn new(
        provider: Box<dyn DataProvider>,
        storage: Box<dyn Storage>,
        calendar: TradingCalendar,
        manifest: ManifestFile,
        audit: AuditLog,
        options: FetchOptions,
    ) -> Self {
        Self {
            provider,
            storage,
            calendar,
            manifest,
            audit,
            options,
        }
    }

    /// Fetch every trading day in `[from, to)` for `tickers`.
    ///
    /// Per-day and per-ticker failures are logged and counted, never returned.
    pub async fn run(
        &self,
        tickers: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<FetchReport, FetchError> {
        if tickers.is_empty() {
            return Err(FetchError::NoTickers);
        }
        if from >= to {
            return Err(FetchError::EmptyRange { from, to });
        }

        let label = tickers.join(",");
        self.audit.record(&LogRecord::new(
            Step::Start,
            Status::Start,
            from,
            to,
            label.as_str(),
            format!("fetching {} tickers for [{from}, {to})", tickers.len()),
        ));

        let mut report = FetchReport::default();
        for day in from.iter_days().take_while(|d| *d < to) {
            self.run_day(tickers, &label, day, &mut report).await;
        }

        info!(
            days_fetched = report.days_fetched,
            days_skipped = report.days_skipped,
            days_failed = report.days_failed,
            files = report.files_written.len(),
            "fetch run finished"
        );
        Ok(report)
    }

    async fn run_day(&self, tickers: &[String], label: &str, day: NaiveDate, report: &mut FetchReport) {
        if self.calendar.is_market_closed(day) {
            self.audit.record(&LogRecord::for_day(
                Step::CheckMarket,
                Status::Skip,
                day,
                label,
                "market closed",
            ));
            report.days_skipped += 1;
            return;
        }

        let started = Instant::now();
        let series = match self.fetch_with_retry(tickers, day).await {
            Ok(series) => series,
            Err(e) => {
                self.audit.record(
                    &LogRecord::for_day(Step::FetchData, Status::Fail, day, label, e.to_string())
                        .with_duration(started.elapsed()),
                );
                report.days_failed += 1;
                return;
            }
        };

        let by_ticker = group_by_ticker(tickers, series, day);
        let with_data = by_ticker.values().filter(|bars| !bars.is_empty()).count();
        if with_data == 0 {
            self.audit.record(
                &LogRecord::for_day(
                    Step::FetchData,
                    Status::Fail,
                    day,
                    label,
                    "no data returned for any ticker",
                )
                .with_duration(started.elapsed()),
            );
            report.days_failed += 1;
            return;
        }
        self.audit.record(
            &LogRecord::for_day(
                Step::FetchData,
                Status::Success,
                day,
                label,
                format!("{with_data} of {} tickers returned data", tickers.len()),
            )
            .with_duration(started.elapsed()),
        );
        report.days_fetched += 1;

        let mut rollup: Vec<PriceBar> = Vec::new();
        for (ticker, bars) in &by_ticker {
            let started = Instant::now();
            if bars.is_empty() {
                self.audit.record(&LogRecord::for_day(
                    Step::SaveCsvTicker,
                    Status::Fail,
                    day,
                    ticker.as_str(),
                    format!("no data for {ticker}"),
                ));
                report.ticker_failures.push((day, ticker.clone()));
                continue;
            }

            let path = PartitionKey::ticker(ticker.as_str(), day).path_under(&self.options.csv_root);
            match self.save_partition(&path, bars, true).await {
                Ok(()) => {
                    self.audit.record(
                        &LogRecord::for_day(Step::SaveCsvTicker, Status::Success, day, ticker.as_str(), path.as_str())
                            .with_duration(started.elapsed()),
                    );
                    report.files_written.push(path);
                    rollup.extend(bars.iter().cloned());
                }
                Err(message) => {
                    self.audit.record(
                        &LogRecord::for_day(Step::SaveCsvTicker, Status::Fail, day, ticker.as_str(), message)
                            .with_duration(started.elapsed()),
                    );
                    report.ticker_failures.push((day, ticker.clone()));
                }
            }
        }

        if self.options.write_daily_rollup && !rollup.is_empty() {
            let started = Instant::now();
            let path = PartitionKey::daily(day).path_under(&self.options.csv_root);
            let (status, message) = match self.save_partition(&path, &rollup, false).await {
                Ok(()) => (Status::Success, path),
                Err(message) => (Status::Fail, message),
            };
            self.audit.record(
                &LogRecord::for_day(Step::SaveCsv, status, day, label, message)
                    .with_duration(started.elapsed()),
            );
        }
    }

    async fn fetch_with_retry(
        &self,
        tickers: &[String],
        day: NaiveDate,
    ) -> Result<Vec<BarSeries>, ProviderError> {
        let params = BarsRequestParams::single_day(tickers, day);
        let attempts = self.options.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.provider.fetch_bars(&params).await {
                Ok(series) => return Ok(series),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(%day, attempt, attempts, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(self.options.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Serialize and store one partition, optionally queueing it for the loader.
    async fn save_partition(&self, path: &str, bars: &[PriceBar], enqueue: bool) -> Result<(), String> {
        let bytes = bars_to_csv(bars).map_err(|e| format!("cannot serialize {path}: {e}"))?;
        self.storage
            .put(path, &bytes)
            .await
            .map_err(|e| format!("cannot write {path}: {e}"))?;
        if enqueue {
            self.manifest
                .append(path)
                .map_err(|e| format!("wrote {path} but could not queue it: {e}"))?;
        }
        Ok(())
    }
}

/// Bars per requested ticker, in request order, restricted to `day` and
/// stripped of bars with no values. Tickers without data map to an empty vec.
fn group_by_ticker(
    tickers: &[String],
    series: Vec<BarSeries>,
    day: NaiveDate,
) -> IndexMap<String, Vec<PriceBar>> {
    let mut by_ticker: IndexMap<String, Vec<PriceBar>> =
        tickers.iter().map(|t| (t.clone(), Vec::new())).collect();
    for s in series {
        let Some(bars) = by_ticker.get_mut(&s.symbol.to_uppercase()) else {
            warn!(symbol = %s.symbol, "provider returned an unrequested symbol");
            continue;
        };
        bars.extend(
            s.bars
                .iter()
                .filter(|b| b.date == day && !b.is_empty())
                .map(|b| b.to_price_bar(&s.symbol.to_uppercase())),
        );
    }
    by_ticker
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn range_defaults_and_single_day() {
        let today = d(2023, 1, 10);
        assert_eq!(resolve_range(None, None, today), Ok((d(2023, 1, 9), today)));
        assert_eq!(
            resolve_range(Some(d(2023, 1, 3)), None, today),
            Ok((d(2023, 1, 3), d(2023, 1, 4)))
        );
        assert_eq!(
            resolve_range(Some(d(2023, 1, 5)), Some(d(2023, 1, 5)), today),
            Err(FetchError::EmptyRange {
                from: d(2023, 1, 5),
                to: d(2023, 1, 5)
            })
        );
    }

    #[test]
    fn grouping_keeps_request_order_and_drops_empty_bars() {
        use crate::models::bar::Bar;

        let day = d(2023, 1, 3);
        let bar = |date, close: Option<f64>| Bar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: close.map(|_| 100.0),
        };
        let series = vec![
            BarSeries {
                symbol: "MSFT".into(),
                bars: vec![bar(day, Some(239.58)), bar(d(2023, 1, 4), Some(229.1))],
            },
            BarSeries {
                symbol: "AAPL".into(),
                bars: vec![bar(day, None)],
            },
        ];
        let grouped = group_by_ticker(&["AAPL".into(), "MSFT".into()], series, day);
        assert_eq!(grouped.keys().collect::<Vec<_>>(), ["AAPL", "MSFT"]);
        assert!(grouped["AAPL"].is_empty());
        assert_eq!(grouped["MSFT"].len(), 1);
        assert_eq!(grouped["MSFT"][0].date, day);
    }
}
