//! Staging and reconciliation of one [`StagingBatch`] against `stock_data`.
//!
//! A file moves through `Pending → Staging → Staged → Reconciling → Moved →
//! Cleaned`; any error lands in `Failed`. Whatever happens, the staging table
//! is dropped before [`ReconcileEngine::load_batch`] returns.

use diesel::result::Error as DieselError;
use price_fetcher::io::StorageError;
use price_store::csv_format::CSV_COLUMNS;
use price_store::db::DbError;
use price_store::db::session::{Dialect, SqlSession};
use price_store::partition::PartitionNameError;
use price_store::table_ref::{TableRef, TableRefError, quote_ident};
use thiserror::Error;
use tracing::{debug, error};

use crate::csv_stage::StagingBatch;

/// Rows per multi-row `INSERT` into the staging table.
pub const STAGING_CHUNK_ROWS: usize = 100;

/// Where a file is in its load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Pending,
    Staging,
    Staged,
    Reconciling,
    Moved,
    Cleaned,
    Failed,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoadStage::Pending => "pending",
            LoadStage::Staging => "staging",
            LoadStage::Staged => "staged",
            LoadStage::Reconciling => "reconciling",
            LoadStage::Moved => "moved",
            LoadStage::Cleaned => "cleaning up",
            LoadStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    BadFileName(#[from] PartitionNameError),

    #[error("could not read CSV: {0}")]
    Storage(#[from] StorageError),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV has no `{0}` column")]
    MissingColumn(&'static str),

    #[error("CSV has no data rows")]
    Empty,

    #[error("row {row}: `{value}` is not a valid {column}")]
    BadValue {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error(transparent)]
    Connect(#[from] DbError),

    #[error(transparent)]
    Table(#[from] TableRefError),

    #[error("database error while {stage}: {source}")]
    Database {
        stage: LoadStage,
        #[source]
        source: DieselError,
    },

    #[error("rows were loaded but staging table {table} could not be dropped: {source}")]
    Cleanup {
        table: String,
        #[source]
        source: DieselError,
    },
}

impl LoadError {
    /// The stage the file was in when this error happened.
    pub fn stage(&self) -> LoadStage {
        match self {
            LoadError::BadFileName(_)
            | LoadError::Storage(_)
            | LoadError::Csv(_)
            | LoadError::MissingColumn(_)
            | LoadError::Empty
            | LoadError::BadValue { .. }
            | LoadError::Table(_) => LoadStage::Pending,
            LoadError::Connect(_) => LoadStage::Staging,
            LoadError::Database { stage, .. } => *stage,
            LoadError::Cleanup { .. } => LoadStage::Cleaned,
        }
    }
}

fn at(stage: LoadStage) -> impl FnOnce(DieselError) -> LoadError {
    move |source| LoadError::Database { stage, source }
}

/// Row counts for one successfully loaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Rows copied into the staging table.
    pub rows_staged: usize,
    /// Staged rows whose (ticker, date) was already in the destination.
    pub rows_already_present: usize,
    /// Rows that made it into the destination.
    pub rows_inserted: usize,
}

impl LoadOutcome {
    /// Staged rows that were neither pre-existing nor inserted: blank keys,
    /// unparseable dates, duplicates within the file.
    pub fn rows_discarded(&self) -> usize {
        self.rows_staged
            .saturating_sub(self.rows_already_present)
            .saturating_sub(self.rows_inserted)
    }
}

/// Runs the staging and reconciliation statements for one destination and
/// one staging table.
#[derive(Debug, Clone)]
pub struct ReconcileEngine {
    destination: TableRef,
    staging: TableRef,
}

impl ReconcileEngine {
    pub fn new(destination: TableRef, staging: TableRef) -> Self {
        Self {
            destination,
            staging,
        }
    }

    pub fn destination(&self) -> &TableRef {
        &self.destination
    }

    pub fn staging(&self) -> &TableRef {
        &self.staging
    }

    /// Stage `batch`, drop the rows the destination already has, insert the
    /// rest, and drop the staging table.
    ///
    /// A failure after the data moved but during cleanup is reported as
    /// [`LoadError::Cleanup`]; the destination keeps the inserted rows.
    pub fn load_batch<S: SqlSession>(
        &self,
        session: &mut S,
        batch: &StagingBatch,
    ) -> Result<LoadOutcome, LoadError> {
        let result = self.stage_and_move(session, batch);
        let cleanup = session.execute_sql(&self.drop_staging_sql());

        match (result, cleanup) {
            (Ok(outcome), Ok(_)) => {
                debug!(table = %self.staging, stage = %LoadStage::Cleaned, "staging table dropped");
                Ok(outcome)
            }
            (Ok(_), Err(source)) => Err(LoadError::Cleanup {
                table: self.staging.to_string(),
                source,
            }),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                error!(
                    table = %self.staging,
                    error = %cleanup_err,
                    "could not drop staging table after a failed load"
                );
                Err(e)
            }
        }
    }

    fn stage_and_move<S: SqlSession>(
        &self,
        session: &mut S,
        batch: &StagingBatch,
    ) -> Result<LoadOutcome, LoadError> {
        let dialect = session.dialect();

        debug!(table = %self.staging, stage = %LoadStage::Staging, rows = batch.len());
        session
            .execute_sql(&self.drop_staging_sql())
            .map_err(at(LoadStage::Staging))?;
        session
            .execute_sql(&self.create_staging_sql())
            .map_err(at(LoadStage::Staging))?;

        let rows_staged = session
            .run_in_transaction(|s| {
                let mut staged = 0;
                for chunk in batch.rows().chunks(STAGING_CHUNK_ROWS) {
                    let binds: Vec<Option<String>> =
                        chunk.iter().flat_map(|row| row.iter().cloned()).collect();
                    staged += s.execute_with_binds(&self.insert_staging_sql(dialect, chunk.len()), &binds)?;
                }
                Ok::<_, DieselError>(staged)
            })
            .map_err(at(LoadStage::Staging))?;
        debug!(table = %self.staging, stage = %LoadStage::Staged, rows = rows_staged);

        let (rows_already_present, rows_inserted) = session
            .run_in_transaction(|s| {
                let present = s.execute_sql(&self.delete_existing_sql(dialect))?;
                let inserted = s.execute_sql(&self.move_sql(dialect))?;
                Ok::<_, DieselError>((present, inserted))
            })
            .map_err(at(LoadStage::Reconciling))?;
        debug!(
            table = %self.destination,
            stage = %LoadStage::Moved,
            already_present = rows_already_present,
            inserted = rows_inserted
        );

        Ok(LoadOutcome {
            rows_staged,
            rows_already_present,
            rows_inserted,
        })
    }

    fn drop_staging_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.staging.qualified())
    }

    fn create_staging_sql(&self) -> String {
        let columns: Vec<String> = CSV_COLUMNS
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect();
        format!("CREATE TABLE {} ({})", self.staging.qualified(), columns.join(", "))
    }

    fn insert_staging_sql(&self, dialect: Dialect, rows: usize) -> String {
        let columns: Vec<String> = CSV_COLUMNS.iter().map(|c| quote_ident(c)).collect();
        let width = CSV_COLUMNS.len();
        let values: Vec<String> = (0..rows)
            .map(|r| {
                let marks: Vec<String> = (1..=width)
                    .map(|c| dialect.placeholder(r * width + c))
                    .collect();
                format!("({})", marks.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.staging.qualified(),
            columns.join(", "),
            values.join(", ")
        )
    }

    fn staged_ticker(&self, dialect: Dialect) -> String {
        dialect.sanitize(&self.staging.column("ticker"))
    }

    fn staged_date(&self, dialect: Dialect) -> String {
        dialect.cast_date(&dialect.sanitize(&self.staging.column("date")))
    }

    /// Remove staged rows whose key is already in the destination.
    fn delete_existing_sql(&self, dialect: Dialect) -> String {
        format!(
            "DELETE FROM {stg} WHERE EXISTS (SELECT 1 FROM {dst} WHERE {dst_ticker} = {ticker} AND {dst_date} = {date})",
            stg = self.staging.qualified(),
            dst = self.destination.qualified(),
            dst_ticker = self.destination.column("ticker"),
            dst_date = self.destination.column("date"),
            ticker = self.staged_ticker(dialect),
            date = self.staged_date(dialect),
        )
    }

    /// Insert what is left, typed and cleaned, skipping keys that appear
    /// concurrently or twice in the file.
    fn move_sql(&self, dialect: Dialect) -> String {
        let ticker = self.staged_ticker(dialect);
        let date = self.staged_date(dialect);
        let price = |c: &str| dialect.cast_numeric(&dialect.sanitize(&self.staging.column(c)));
        let volume = dialect.cast_bigint(&dialect.sanitize(&self.staging.column("volume")));
        format!(
            "INSERT INTO {dst} (\"ticker\", \"date\", \"open\", \"high\", \"low\", \"close\", \"volume\") \
             SELECT {ticker}, {date}, {open}, {high}, {low}, {close}, {volume} FROM {stg} \
             WHERE {ticker} IS NOT NULL AND {date} IS NOT NULL \
             ON CONFLICT (\"ticker\", \"date\") DO NOTHING",
            dst = self.destination.qualified(),
            stg = self.staging.qualified(),
            open = price("open"),
            high = price("high"),
            low = price("low"),
            close = price("close"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ReconcileEngine {
        ReconcileEngine::new(
            TableRef::destination(Some("market")).unwrap(),
            TableRef::new(Some("market"), "stock_data_temp").unwrap(),
        )
    }

    #[test]
    fn staging_insert_numbers_placeholders_per_row() {
        let sql = engine().insert_staging_sql(Dialect::Postgres, 2);
        assert!(sql.starts_with("INSERT INTO \"market\".\"stock_data_temp\""));
        assert!(sql.contains("($1, $2, $3, $4, $5, $6, $7), ($8, $9, $10, $11, $12, $13, $14)"));

        let sql = engine().insert_staging_sql(Dialect::Sqlite, 1);
        assert!(sql.ends_with("VALUES (?, ?, ?, ?, ?, ?, ?)"));
    }

    #[test]
    fn move_targets_destination_with_conflict_guard() {
        let sql = engine().move_sql(Dialect::Postgres);
        assert!(sql.starts_with("INSERT INTO \"market\".\"stock_data\""));
        assert!(sql.contains("FROM \"market\".\"stock_data_temp\""));
        assert!(sql.contains("CAST(NULLIF(TRIM(REPLACE(\"market\".\"stock_data_temp\".\"date\", CHR(13), '')), '') AS DATE)"));
        assert!(sql.ends_with("ON CONFLICT (\"ticker\", \"date\") DO NOTHING"));
    }

    #[test]
    fn discarded_rows_are_the_remainder() {
        let outcome = LoadOutcome {
            rows_staged: 5,
            rows_already_present: 2,
            rows_inserted: 2,
        };
        assert_eq!(outcome.rows_discarded(), 1);
    }

    #[test]
    fn stage_is_reported_per_error() {
        assert_eq!(LoadError::Empty.stage(), LoadStage::Pending);
        let e = LoadError::Database {
            stage: LoadStage::Reconciling,
            source: DieselError::NotFound,
        };
        assert_eq!(e.stage(), LoadStage::Reconciling);
        assert!(e.to_string().contains("while reconciling"));
    }
}
