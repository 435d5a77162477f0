use anyhow::bail;
use chrono::NaiveDate;
use clap::Parser;
use price_store::query::PriceQuery;
use shared_utils::config::AppConfig;
use shared_utils::logging::init_tracing;

/// Read stored price bars as JSON.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Only this ticker.
    #[arg(long)]
    ticker: Option<String>,

    /// Only this trading day (YYYY-MM-DD).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// List the distinct tickers instead of bars.
    #[arg(long, conflicts_with_all = ["ticker", "date"])]
    tickers: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let query = PriceQuery::new(config.database)?;

    let json = if cli.tickers {
        serde_json::to_string_pretty(&query.tickers()?)?
    } else {
        let ticker = cli.ticker.map(|t| t.trim().to_ascii_uppercase());
        match (ticker, cli.date) {
            (Some(t), Some(d)) => serde_json::to_string_pretty(&query.by_ticker_and_date(&t, d)?)?,
            (Some(t), None) => serde_json::to_string_pretty(&query.by_ticker(&t)?)?,
            (None, Some(d)) => serde_json::to_string_pretty(&query.by_date(d)?)?,
            (None, None) => bail!("pass --ticker, --date or --tickers"),
        }
    };
    println!("{json}");
    Ok(())
}
