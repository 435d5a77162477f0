//! Append-only audit trail in `stock_data_log`.
//!
//! Each record opens its own short-lived connection. Writing the log never
//! fails the caller: if the table is unreachable the record is reported on
//! the console instead. Every record is also emitted as a tracing event.

use diesel::prelude::*;
use shared_utils::config::DbConfig;

use crate::db::DbResult;
use crate::db::connection::connect;
use crate::models::{LogEntry, LogRecord, NewLogRow, Status, Step};
use crate::schema::stock_data_log;
use crate::with_session;

/// Writer (and reader) for the log table.
#[derive(Debug, Clone)]
pub struct AuditLog {
    db: DbConfig,
}

macro_rules! emit_at {
    ($level:ident, $r:expr) => {
        tracing::$level!(
            step = $r.step.as_str(),
            status = $r.status.as_str(),
            from = %$r.from_date,
            to = %$r.to_date,
            tickers = %$r.tickers,
            duration_s = $r.duration_seconds,
            "{}",
            $r.message
        )
    };
}

fn emit(r: &LogRecord) {
    match (r.step, r.status) {
        (Step::LoadCsv, Status::Fail) => emit_at!(error, r),
        (_, Status::Fail) | (Step::LoadCsv, Status::Skip) => emit_at!(warn, r),
        _ => emit_at!(info, r),
    }
}

impl AuditLog {
    /// Log to the database described by `db`.
    pub fn new(db: DbConfig) -> Self {
        Self { db }
    }

    /// Append `record`. Failures are reported through tracing and swallowed.
    pub fn record(&self, record: &LogRecord) {
        emit(record);
        if let Err(e) = self.insert(record) {
            tracing::error!(
                error = %e,
                step = record.step.as_str(),
                status = record.status.as_str(),
                "could not write to the log table"
            );
        }
    }

    fn insert(&self, record: &LogRecord) -> DbResult<()> {
        let mut conn = connect(&self.db)?;
        let row = NewLogRow::from(record);
        with_session!(&mut conn, |c| {
            diesel::insert_into(stock_data_log::table)
                .values(&row)
                .execute(c)
        })?;
        Ok(())
    }

    /// Every stored record, oldest first.
    pub fn entries(&self) -> DbResult<Vec<LogEntry>> {
        let mut conn = connect(&self.db)?;
        let rows = with_session!(&mut conn, |c| {
            stock_data_log::table
                .order(stock_data_log::id.asc())
                .load::<LogEntry>(c)
        })?;
        Ok(rows)
    }
}
