mod common;
use common::{FlatProvider, Harness, d};

use std::time::Duration;

use price_fetcher::calendar::TradingCalendar;
use price_fetcher::io::LocalStorage;
use price_fetcher::pipeline::{FetchOptions, Fetcher};
use price_store::audit::AuditLog;
use price_store::db::session::SqlSession;
use shared_utils::config::RetryPolicy;

#[tokio::test]
async fn fetch_then_load_first_trading_week_of_2023() {
    let h = Harness::new();
    let fetcher = Fetcher::new(
        Box::new(FlatProvider),
        Box::new(LocalStorage),
        TradingCalendar::nyse(),
        h.manifest.clone(),
        AuditLog::new(h.db.clone()),
        FetchOptions {
            csv_root: h.csv_root.clone(),
            retry: RetryPolicy {
                attempts: 1,
                delay: Duration::ZERO,
            },
            write_daily_rollup: false,
        },
    );
    let tickers = ["AAPL".to_string(), "MSFT".to_string()];

    let report = fetcher.run(&tickers, d("2023-01-01"), d("2023-01-10")).await.unwrap();
    assert_eq!(report.files_written.len(), 10);

    // The same file queued twice, as after a re-run of one day.
    h.manifest.append(&report.files_written[0]).unwrap();

    let summary = h.processor().process_manifest().await;
    assert_eq!(summary.loaded, 11);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.rows_inserted, 10);
    assert_eq!(h.conn().count_rows("stock_data").unwrap(), 10);
    assert!(!h.conn().table_exists(None, "stock_data_temp").unwrap());

    let q = h.query();
    let aapl = q.by_ticker("AAPL").unwrap();
    let days: Vec<String> = aapl.iter().map(|b| b.date.to_string()).collect();
    assert_eq!(days, ["2023-01-03", "2023-01-04", "2023-01-05", "2023-01-06", "2023-01-09"]);
    assert_eq!(aapl[0].open.map(|v| v.normalize().to_string()).as_deref(), Some("100.5"));
    assert_eq!(aapl[0].close.map(|v| v.normalize().to_string()).as_deref(), Some("100"));
    assert_eq!(aapl[0].volume, Some(1_000_000));
    assert!(q.by_date(d("2023-01-02")).unwrap().is_empty());
    assert_eq!(q.tickers().unwrap(), ["AAPL", "MSFT"]);

    assert_eq!(h.count("CHECK_MARKET", "SKIP"), 4);
    assert_eq!(h.count("SAVE_CSV_TICKER", "SUCCESS"), 10);
    assert_eq!(h.count("LOAD_CSV", "SUCCESS"), 11);

    // Nothing queued any more.
    assert_eq!(h.processor().process_manifest().await.loaded, 0);
}
