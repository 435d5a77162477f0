//! Embedded schema migrations, one set per backend.

use anyhow::{Context, anyhow};
use diesel::connection::SimpleConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use shared_utils::config::{DatabaseBackend, DbConfig};

use super::connection::{connect_postgres, connect_sqlite};
use crate::table_ref::{is_identifier, quote_ident};

/// Migrations applied to SQLite files.
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Migrations applied to PostgreSQL databases.
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

/// Runs pending migrations on the SQLite file at `path`, switching it to WAL.
pub fn run_sqlite(path: &str) -> anyhow::Result<()> {
    let mut conn = connect_sqlite(path)?;
    conn.run_pending_migrations(SQLITE_MIGRATIONS)
        .map_err(|e| anyhow!(e))?;

    Ok(())
}

/// Runs pending migrations on PostgreSQL, creating `schema` first when given.
pub fn run_postgres(url: &str, schema: Option<&str>) -> anyhow::Result<()> {
    let mut conn = connect_postgres(url, None)?;

    if let Some(schema) = schema {
        anyhow::ensure!(is_identifier(schema), "invalid schema name `{schema}`");
        let quoted = quote_ident(schema);
        conn.batch_execute(&format!(
            "CREATE SCHEMA IF NOT EXISTS {quoted}; SET search_path TO {quoted};"
        ))
        .with_context(|| format!("preparing schema {schema}"))?;
    }

    conn.run_pending_migrations(POSTGRES_MIGRATIONS)
        .map_err(|e| anyhow!(e))?;

    Ok(())
}

/// Bring the configured database up to date, dispatching on its backend.
pub fn run_all(config: &DbConfig) -> anyhow::Result<()> {
    match config.backend() {
        DatabaseBackend::Postgres => run_postgres(config.expose_url(), config.schema()),
        DatabaseBackend::Sqlite => run_sqlite(config.expose_url()),
    }
}
