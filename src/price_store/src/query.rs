//! Read side over `stock_data`: bars by ticker, by date, by both, and the
//! list of tickers present.
//!
//! Values are read back as text and parsed here, so the same code serves
//! Postgres `NUMERIC` and SQLite's dynamic typing.

use std::str::FromStr;

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::sql_types::{Nullable, Text};
use rust_decimal::Decimal;
use shared_utils::config::DbConfig;
use thiserror::Error;

use crate::db::connection::connect;
use crate::db::session::SqlSession;
use crate::db::DbError;
use crate::models::PriceBar;
use crate::schema::stock_data;
use crate::table_ref::{TableRef, TableRefError};
use crate::with_session;

/// Failures answering a price query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Could not connect.
    #[error(transparent)]
    Db(#[from] DbError),
    /// The statement failed.
    #[error("query failed: {0}")]
    Sql(#[from] diesel::result::Error),
    /// The destination table name was rejected.
    #[error(transparent)]
    Table(#[from] TableRefError),
    /// A stored value could not be parsed back.
    #[error("unreadable {column} value `{value}` in stock_data")]
    Corrupt {
        /// Column name.
        column: &'static str,
        /// Raw text.
        value: String,
    },
}

#[derive(QueryableByName)]
struct StoredBarRow {
    #[diesel(sql_type = Text)]
    ticker: String,
    #[diesel(sql_type = Text)]
    date: String,
    #[diesel(sql_type = Nullable<Text>)]
    open: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    high: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    low: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    close: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    volume: Option<String>,
}

fn parse_price(column: &'static str, raw: Option<String>) -> Result<Option<Decimal>, QueryError> {
    let Some(raw) = raw else { return Ok(None) };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| QueryError::Corrupt { column, value: raw })
}

impl TryFrom<StoredBarRow> for PriceBar {
    type Error = QueryError;

    fn try_from(row: StoredBarRow) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
            QueryError::Corrupt {
                column: "date",
                value: row.date.clone(),
            }
        })?;
        let volume = match row.volume {
            Some(v) => Some(v.parse::<i64>().map_err(|_| QueryError::Corrupt {
                column: "volume",
                value: v,
            })?),
            None => None,
        };
        Ok(PriceBar {
            date,
            ticker: row.ticker,
            open: parse_price("open", row.open)?,
            high: parse_price("high", row.high)?,
            low: parse_price("low", row.low)?,
            close: parse_price("close", row.close)?,
            volume,
        })
    }
}

enum Filter<'a> {
    Ticker(&'a str),
    Date(NaiveDate),
    TickerAndDate(&'a str, NaiveDate),
}

fn select_bars<S: SqlSession>(
    session: &mut S,
    table: &TableRef,
    filter: Filter<'_>,
) -> Result<Vec<PriceBar>, QueryError> {
    let d = session.dialect();
    let mut sql = format!(
        "SELECT {ticker} AS ticker, {date} AS date, {open} AS open, {high} AS high, \
         {low} AS low, {close} AS close, {volume} AS volume FROM {table}",
        ticker = d.as_text("ticker"),
        date = d.as_text("date"),
        open = d.as_text("open"),
        high = d.as_text("high"),
        low = d.as_text("low"),
        close = d.as_text("close"),
        volume = d.as_text("volume"),
        table = table.qualified(),
    );

    let binds = match filter {
        Filter::Ticker(t) => {
            sql.push_str(&format!(" WHERE ticker = {} ORDER BY date", d.placeholder(1)));
            vec![Some(t.to_string())]
        }
        Filter::Date(date) => {
            sql.push_str(&format!(
                " WHERE date = {} ORDER BY ticker",
                d.cast_date(&d.placeholder(1))
            ));
            vec![Some(date.to_string())]
        }
        Filter::TickerAndDate(t, date) => {
            sql.push_str(&format!(
                " WHERE ticker = {} AND date = {}",
                d.placeholder(1),
                d.cast_date(&d.placeholder(2))
            ));
            vec![Some(t.to_string()), Some(date.to_string())]
        }
    };

    session
        .load_with_binds::<StoredBarRow>(&sql, &binds)?
        .into_iter()
        .map(PriceBar::try_from)
        .collect()
}

/// Query service over the destination table. Opens one connection per call.
#[derive(Debug, Clone)]
pub struct PriceQuery {
    db: DbConfig,
    table: TableRef,
}

impl PriceQuery {
    /// Query `stock_data` in the configured schema.
    pub fn new(db: DbConfig) -> Result<Self, QueryError> {
        let table = TableRef::destination(db.schema())?;
        Ok(Self { db, table })
    }

    fn run(&self, filter: Filter<'_>) -> Result<Vec<PriceBar>, QueryError> {
        let mut conn = connect(&self.db)?;
        with_session!(&mut conn, |s| select_bars(s, &self.table, filter))
    }

    /// All bars of `ticker`, oldest first.
    pub fn by_ticker(&self, ticker: &str) -> Result<Vec<PriceBar>, QueryError> {
        self.run(Filter::Ticker(ticker))
    }

    /// All bars on `date`, by ticker.
    pub fn by_date(&self, date: NaiveDate) -> Result<Vec<PriceBar>, QueryError> {
        self.run(Filter::Date(date))
    }

    /// The bar for `(ticker, date)`, if loaded.
    pub fn by_ticker_and_date(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Option<PriceBar>, QueryError> {
        Ok(self.run(Filter::TickerAndDate(ticker, date))?.into_iter().next())
    }

    /// Distinct tickers present, sorted.
    pub fn tickers(&self) -> Result<Vec<String>, QueryError> {
        let mut conn = connect(&self.db)?;
        let tickers = with_session!(&mut conn, |c| {
            stock_data::table
                .select(stock_data::ticker)
                .distinct()
                .order(stock_data::ticker.asc())
                .load::<String>(c)
        })?;
        Ok(tickers)
    }
}
