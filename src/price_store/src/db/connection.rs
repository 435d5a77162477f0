//! Connection helpers for both backends.
//!
//! [`connect`] picks the backend from a [`DbConfig`]. [`connect_sqlite`]
//! applies the PRAGMAs local runs and tests rely on: WAL journaling,
//! foreign_keys=ON and a 5000ms busy_timeout.
//!
//! Example:
//! ```no_run
//! use price_store::db::connection::connect_sqlite;
//!
//! let path = std::env::temp_dir().join("price_store_example.db");
//! let _conn = connect_sqlite(&path.to_string_lossy()).expect("open sqlite");
//! ```

use diesel::connection::SimpleConnection;
use diesel::{Connection, PgConnection, SqliteConnection};
use shared_utils::config::{DatabaseBackend, DbConfig};

use super::{DbError, DbResult};
use crate::table_ref::{is_identifier, quote_ident};

/// An open connection to whichever backend the configuration points at.
pub enum DbConnection {
    /// PostgreSQL via libpq.
    Postgres(PgConnection),
    /// SQLite file.
    Sqlite(SqliteConnection),
}

/// Run the same block against whichever connection variant is live.
///
/// The block is expanded once per backend, so it may use backend-generic diesel
/// code (`insert_into(..).execute(conn)`, [`SqlSession`](crate::db::session::SqlSession)
/// methods, ...).
///
/// ```no_run
/// use price_store::with_session;
/// use price_store::db::{connection::connect, session::SqlSession};
/// # let config = shared_utils::config::DbConfig::sqlite("prices.db");
/// let mut conn = connect(&config).unwrap();
/// let exists = with_session!(&mut conn, |s| s.table_exists(None, "stock_data"));
/// ```
#[macro_export]
macro_rules! with_session {
    ($conn:expr, |$s:ident| $body:expr) => {
        match $conn {
            $crate::db::connection::DbConnection::Postgres($s) => $body,
            $crate::db::connection::DbConnection::Sqlite($s) => $body,
        }
    };
}

impl DbConnection {
    /// Which backend this connection talks to.
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            DbConnection::Postgres(_) => DatabaseBackend::Postgres,
            DbConnection::Sqlite(_) => DatabaseBackend::Sqlite,
        }
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbConnection").field(&self.backend()).finish()
    }
}

/// Open a connection for `config`.
pub fn connect(config: &DbConfig) -> DbResult<DbConnection> {
    match config.backend() {
        DatabaseBackend::Postgres => {
            connect_postgres(config.expose_url(), config.schema()).map(DbConnection::Postgres)
        }
        DatabaseBackend::Sqlite => connect_sqlite(config.expose_url()).map(DbConnection::Sqlite),
    }
}

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> DbResult<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url).map_err(|source| DbError::Connect {
        backend: "sqlite",
        source,
    })?;

    // Read concurrency with a second process (fetcher audit + loader).
    conn.batch_execute("PRAGMA journal_mode=WAL;")?;
    conn.batch_execute("PRAGMA foreign_keys=ON;")?;
    conn.batch_execute("PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

/// Open a Postgres connection, pinning `search_path` to `schema` when given.
pub fn connect_postgres(database_url: &str, schema: Option<&str>) -> DbResult<PgConnection> {
    let mut conn = PgConnection::establish(database_url).map_err(|source| DbError::Connect {
        backend: "postgres",
        source,
    })?;

    if let Some(schema) = schema {
        if !is_identifier(schema) {
            return Err(DbError::InvalidSchema(schema.to_string()));
        }
        conn.batch_execute(&format!("SET search_path TO {}", quote_ident(schema)))?;
    }
    Ok(conn)
}
