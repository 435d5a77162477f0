//! A narrow raw-SQL surface over diesel connections.
//!
//! The staging and reconciliation statements name tables at runtime, so they
//! cannot go through the `table!` DSL. [`SqlSession`] is the seam: it runs
//! text SQL with positional text binds and hides which backend is underneath.
//! [`Dialect`] supplies the few spellings that differ between Postgres and
//! SQLite.

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::sqlite::Sqlite;
use diesel::{PgConnection, QueryResult, QueryableByName, SqliteConnection, sql_query};

/// SQL spelling differences between the supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// SQLite 3.35+.
    Sqlite,
}

impl Dialect {
    /// Positional bind marker for the `n`th parameter (1-based).
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// `expr` with carriage returns removed, surrounding blanks trimmed and
    /// the empty string mapped to NULL.
    pub fn sanitize(self, expr: &str) -> String {
        let cr = match self {
            Dialect::Postgres => "CHR(13)",
            Dialect::Sqlite => "CHAR(13)",
        };
        format!("NULLIF(TRIM(REPLACE({expr}, {cr}, '')), '')")
    }

    /// Cast a text expression to the destination's price type.
    pub fn cast_numeric(self, expr: &str) -> String {
        format!("CAST({expr} AS NUMERIC)")
    }

    /// Cast a text expression to a 64-bit integer, accepting `"1000.0"`.
    pub fn cast_bigint(self, expr: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST(CAST({expr} AS NUMERIC) AS BIGINT)"),
            Dialect::Sqlite => format!("CAST(CAST({expr} AS NUMERIC) AS INTEGER)"),
        }
    }

    /// Cast a `YYYY-MM-DD` text expression to a date.
    ///
    /// SQLite has no date type; `DATE(x)` normalises the text and yields NULL
    /// for garbage.
    pub fn cast_date(self, expr: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST({expr} AS DATE)"),
            Dialect::Sqlite => format!("DATE({expr})"),
        }
    }

    /// Render any column as text for backend-neutral reads.
    pub fn as_text(self, expr: &str) -> String {
        format!("CAST({expr} AS TEXT)")
    }
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    n: i64,
}

/// Raw SQL with positional nullable-text binds, on one live connection.
///
/// Every bind is sent as `Nullable<Text>`; typed conversion happens in SQL.
pub trait SqlSession {
    /// Spelling rules for the backend behind this session.
    fn dialect(&self) -> Dialect;

    /// Execute a statement without parameters, returning affected rows.
    fn execute_sql(&mut self, sql: &str) -> QueryResult<usize>;

    /// Execute a statement with positional binds, returning affected rows.
    fn execute_with_binds(&mut self, sql: &str, binds: &[Option<String>]) -> QueryResult<usize>;

    /// Run a query whose single row carries a `BIGINT` column named `n`.
    fn count_with_binds(&mut self, sql: &str, binds: &[Option<String>]) -> QueryResult<i64>;

    /// Load rows by column name.
    fn load_with_binds<R>(&mut self, sql: &str, binds: &[Option<String>]) -> QueryResult<Vec<R>>
    where
        R: QueryableByName<Pg> + QueryableByName<Sqlite> + 'static;

    /// Run `f` inside a transaction: committed on `Ok`, rolled back on `Err`.
    fn run_in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>;

    /// `SELECT COUNT(*)` over an already-quoted table reference.
    fn count_rows(&mut self, qualified_table: &str) -> QueryResult<i64> {
        self.count_with_binds(&format!("SELECT COUNT(*) AS n FROM {qualified_table}"), &[])
    }

    /// Whether a base table called `name` exists (in `schema`, or the current
    /// schema when `None`; SQLite ignores the schema).
    fn table_exists(&mut self, schema: Option<&str>, name: &str) -> QueryResult<bool> {
        let n = match self.dialect() {
            Dialect::Postgres => self.count_with_binds(
                "SELECT COUNT(*) AS n FROM information_schema.tables \
                 WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2",
                &[schema.map(str::to_string), Some(name.to_string())],
            )?,
            Dialect::Sqlite => self.count_with_binds(
                "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[Some(name.to_string())],
            )?,
        };
        Ok(n > 0)
    }
}

macro_rules! impl_sql_session {
    ($conn:ty, $backend:ty, $dialect:expr) => {
        impl SqlSession for $conn {
            fn dialect(&self) -> Dialect {
                $dialect
            }

            fn execute_sql(&mut self, sql: &str) -> QueryResult<usize> {
                sql_query(sql).execute(self)
            }

            fn execute_with_binds(
                &mut self,
                sql: &str,
                binds: &[Option<String>],
            ) -> QueryResult<usize> {
                let mut query = sql_query(sql).into_boxed::<$backend>();
                for value in binds {
                    query = query.bind::<Nullable<Text>, _>(value.clone());
                }
                query.execute(self)
            }

            fn count_with_binds(
                &mut self,
                sql: &str,
                binds: &[Option<String>],
            ) -> QueryResult<i64> {
                let mut query = sql_query(sql).into_boxed::<$backend>();
                for value in binds {
                    query = query.bind::<Nullable<Text>, _>(value.clone());
                }
                query.get_result::<CountRow>(self).map(|row| row.n)
            }

            fn load_with_binds<R>(
                &mut self,
                sql: &str,
                binds: &[Option<String>],
            ) -> QueryResult<Vec<R>>
            where
                R: QueryableByName<Pg> + QueryableByName<Sqlite> + 'static,
            {
                let mut query = sql_query(sql).into_boxed::<$backend>();
                for value in binds {
                    query = query.bind::<Nullable<Text>, _>(value.clone());
                }
                query.load::<R>(self)
            }

            fn run_in_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
            where
                F: FnOnce(&mut Self) -> Result<T, E>,
                E: From<diesel::result::Error>,
            {
                Connection::transaction(self, f)
            }
        }
    };
}

impl_sql_session!(PgConnection, Pg, Dialect::Postgres);
impl_sql_session!(SqliteConnection, Sqlite, Dialect::Sqlite);
