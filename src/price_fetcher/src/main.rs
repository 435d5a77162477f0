use anyhow::Context;
use chrono::{NaiveDate, Utc};
use chrono_tz::America::New_York;
use clap::Parser;
use price_fetcher::calendar::TradingCalendar;
use price_fetcher::io::storage_from_config;
use price_fetcher::pipeline::{FetchOptions, Fetcher, resolve_range};
use price_fetcher::providers::alpaca_rest::AlpacaProvider;
use price_fetcher::tickers::load_tickers;
use price_store::audit::AuditLog;
use price_store::db::migrate;
use shared_utils::config::AppConfig;
use shared_utils::logging::init_tracing;
use shared_utils::manifest::ManifestFile;
use tracing::{error, info};

/// Fetch daily price bars into date-partitioned CSV files and queue them for loading.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// First day to fetch (YYYY-MM-DD). Defaults to yesterday in New York.
    from_date: Option<NaiveDate>,

    /// End of the range, exclusive (YYYY-MM-DD). Defaults to the day after FROM_DATE.
    to_date: Option<NaiveDate>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let today = Utc::now().with_timezone(&New_York).date_naive();
    let (from, to) = resolve_range(cli.from_date, cli.to_date, today)?;

    // The log table may be down; that must not stop the run.
    if let Err(e) = migrate::run_all(&config.database) {
        error!(error = %e, "could not prepare database tables");
    }

    let calendar = TradingCalendar::from_optional_file(config.holiday_file.as_deref())?;
    let ticker_file = config.require_ticker_file()?;
    let tickers = load_tickers(ticker_file)
        .with_context(|| format!("reading ticker file {}", ticker_file.display()))?;
    info!(%from, %to, tickers = tickers.len(), "starting fetch");

    let fetcher = Fetcher::new(
        Box::new(AlpacaProvider::new()?),
        storage_from_config(&config.storage)?,
        calendar,
        ManifestFile::new(&config.manifest_path),
        AuditLog::new(config.database.clone()),
        FetchOptions::from_config(&config),
    );

    let report = fetcher.run(&tickers, from, to).await?;
    info!(
        files = report.files_written.len(),
        failed_tickers = report.ticker_failures.len(),
        manifest = %config.manifest_path.display(),
        "done"
    );
    Ok(())
}
