//! Database utilities for connections, SQL sessions and schema migrations.
//!
//! This module provides:
//! - [`connection::connect`]: opens a [`connection::DbConnection`] for either
//!   backend. SQLite files get WAL, foreign_keys=ON and a 5000ms busy_timeout;
//!   Postgres gets its `search_path` pinned when a schema is configured.
//! - [`session::SqlSession`]: the small raw-SQL surface the loader needs,
//!   implemented for both diesel connection types.
//! - Embedded Diesel migrations per backend: [`migrate::run_sqlite`],
//!   [`migrate::run_postgres`] and [`migrate::run_all`].
//!
//! Example:
//! ```no_run
//! use price_store::db::{connection, migrate};
//! use shared_utils::config::DbConfig;
//!
//! let db_path = std::env::temp_dir().join("price_store_example.db");
//! let config = DbConfig::sqlite(&db_path.to_string_lossy());
//! migrate::run_all(&config).expect("migrations");
//! let _conn = connection::connect(&config).expect("connect");
//! ```

pub mod connection;
pub mod migrate;
pub mod session;

use thiserror::Error;

/// Failures opening or preparing a database connection.
#[derive(Debug, Error)]
pub enum DbError {
    /// The driver could not establish a connection.
    #[error("could not connect to {backend} database: {source}")]
    Connect {
        /// `postgres` or `sqlite`.
        backend: &'static str,
        /// Driver error.
        #[source]
        source: diesel::ConnectionError,
    },

    /// A statement issued while preparing or using the connection failed.
    #[error("database statement failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// The configured schema is not a plain identifier.
    #[error("invalid schema name `{0}`")]
    InvalidSchema(String),
}

/// Shorthand for results carrying a [`DbError`].
pub type DbResult<T> = Result<T, DbError>;
