mod common;
use common::{insert_bar, setup_db};

use chrono::NaiveDate;
use price_store::query::PriceQuery;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn lookups_by_ticker_date_and_both() {
    let (db, mut conn) = setup_db();
    insert_bar(&mut conn, "MSFT", "2023-01-03", "239.58", 25740000);
    insert_bar(&mut conn, "AAPL", "2023-01-04", "126.36", 89113600);
    insert_bar(&mut conn, "AAPL", "2023-01-03", "125.07", 112117500);

    let q = PriceQuery::new(db.config()).unwrap();

    let aapl = q.by_ticker("AAPL").unwrap();
    assert_eq!(aapl.len(), 2);
    assert_eq!(aapl[0].date, d("2023-01-03"));
    assert_eq!(aapl[0].close, Some(Decimal::from_str("125.07").unwrap()));
    assert_eq!(aapl[0].volume, Some(112117500));

    let day = q.by_date(d("2023-01-03")).unwrap();
    let tickers: Vec<&str> = day.iter().map(|b| b.ticker.as_str()).collect();
    assert_eq!(tickers, ["AAPL", "MSFT"]);

    let one = q.by_ticker_and_date("MSFT", d("2023-01-03")).unwrap().unwrap();
    assert_eq!(one.open, Some(Decimal::from_str("239.58").unwrap()));
    assert!(q.by_ticker_and_date("MSFT", d("2023-01-04")).unwrap().is_none());

    assert_eq!(q.tickers().unwrap(), ["AAPL", "MSFT"]);
}

#[test]
fn null_values_come_back_as_none() {
    let (db, mut conn) = setup_db();
    use diesel::prelude::*;
    diesel::sql_query("INSERT INTO stock_data (ticker, date) VALUES ('IBM', '2023-01-05')")
        .execute(&mut conn)
        .unwrap();

    let bar = PriceQuery::new(db.config())
        .unwrap()
        .by_ticker_and_date("IBM", d("2023-01-05"))
        .unwrap()
        .unwrap();
    assert!(bar.is_empty());
}
