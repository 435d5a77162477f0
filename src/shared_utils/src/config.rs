//! Process configuration, built once at startup and passed down by reference.
//!
//! Every knob is read through a lookup closure so tests can feed a map instead
//! of mutating the process environment. [`AppConfig::from_env`] is the thin
//! production wrapper: it loads `.env` and reads `std::env`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::env::{get_env_var_opt, load_dotenv};

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// Which SQL backend a connection string points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres,
    Sqlite,
}

/// Connection parameters for the destination database.
///
/// The connection string may carry a password, so it is kept behind a
/// [`SecretString`] and never printed by `Debug`.
#[derive(Debug)]
pub struct DbConfig {
    backend: DatabaseBackend,
    url: SecretString,
    schema: Option<String>,
}

impl Clone for DbConfig {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend,
            url: SecretString::new(self.url.expose_secret().into()),
            schema: self.schema.clone(),
        }
    }
}

impl DbConfig {
    /// Classify a `DATABASE_URL`: `postgres://` and `postgresql://` are Postgres,
    /// `sqlite://`, `sqlite:` and bare paths are SQLite files.
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::postgres(url)
        } else {
            let path = url
                .strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .unwrap_or(url);
            Self::sqlite(path)
        }
    }

    pub fn postgres(url: &str) -> Self {
        Self {
            backend: DatabaseBackend::Postgres,
            url: SecretString::new(url.into()),
            schema: None,
        }
    }

    pub fn sqlite(path: &str) -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: SecretString::new(path.into()),
            schema: None,
        }
    }

    /// Build a libpq keyword/value connection string from discrete parts.
    pub fn postgres_from_parts(
        host: &str,
        port: u16,
        dbname: &str,
        user: &str,
        password: Option<&str>,
    ) -> Self {
        let mut conninfo = format!(
            "host={} port={} dbname={} user={}",
            conninfo_quote(host),
            port,
            conninfo_quote(dbname),
            conninfo_quote(user)
        );
        if let Some(pw) = password {
            conninfo.push_str(" password=");
            conninfo.push_str(&conninfo_quote(pw));
        }
        Self::postgres(&conninfo)
    }

    /// Restrict unqualified table names to this schema. SQLite has no
    /// schemas, so the value is dropped there.
    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = match self.backend {
            DatabaseBackend::Postgres => schema.filter(|s| !s.is_empty()),
            DatabaseBackend::Sqlite => None,
        };
        self
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// The raw connection string, for handing to the driver.
    pub fn expose_url(&self) -> &str {
        self.url.expose_secret()
    }
}

fn conninfo_quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Where CSV partitions are written and read back from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Local filesystem rooted at [`AppConfig::csv_root`].
    Local,
    /// WebHDFS REST endpoint, e.g. `http://namenode:9870`.
    WebHdfs { url: String, user: Option<String> },
}

/// Fixed-count retry loop for provider calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// How the loader names its staging table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagingMode {
    /// `<destination>_temp`, shared by every run. Assumes a single loader.
    #[default]
    Fixed,
    /// `<destination>_temp_<suffix>`, unique per process run.
    PerRun,
}

/// Everything either pipeline needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DbConfig,
    /// Root under which date-structured CSV partitions live.
    pub csv_root: String,
    pub manifest_path: PathBuf,
    pub ticker_file: Option<PathBuf>,
    pub storage: StorageConfig,
    pub holiday_file: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub write_daily_rollup: bool,
    pub staging: StagingMode,
}

impl AppConfig {
    /// Load `.env`, then read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(get_env_var_opt)
    }

    /// Resolve configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &str| get(name).ok_or_else(|| ConfigError::MissingEnvVar(name.into()));

        let database = match get("DATABASE_URL") {
            Some(url) => DbConfig::from_url(&url),
            None => {
                let port = match get("DB_PORT") {
                    Some(p) => parse_value::<u16>("DB_PORT", &p)?,
                    None => 5432,
                };
                DbConfig::postgres_from_parts(
                    &require("DB_HOST")?,
                    port,
                    &require("DB_NAME")?,
                    &require("DB_USER")?,
                    get("DB_PASS").as_deref(),
                )
            }
        }
        .with_schema(get("DB_SCHEMA"));

        let csv_root = require("CSV_DIR")?;
        let manifest_path = get("MANIFEST_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&csv_root).join("csv_files.log"));

        let storage = match get("HDFS_URL") {
            Some(url) => StorageConfig::WebHdfs {
                url: url.trim_end_matches('/').to_string(),
                user: get("HDFS_USER"),
            },
            None => StorageConfig::Local,
        };

        let mut retry = RetryPolicy::default();
        if let Some(v) = get("FETCH_RETRY_ATTEMPTS") {
            retry.attempts = parse_value::<u32>("FETCH_RETRY_ATTEMPTS", &v)?.max(1);
        }
        if let Some(v) = get("FETCH_RETRY_DELAY_SECS") {
            retry.delay = Duration::from_secs(parse_value("FETCH_RETRY_DELAY_SECS", &v)?);
        }

        let write_daily_rollup = match get("WRITE_DAILY_ROLLUP") {
            Some(v) => parse_flag("WRITE_DAILY_ROLLUP", &v)?,
            None => false,
        };

        let staging = match get("STAGING_TABLE_MODE").as_deref() {
            None | Some("fixed") => StagingMode::Fixed,
            Some("per_run") => StagingMode::PerRun,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "STAGING_TABLE_MODE".into(),
                    message: format!("expected `fixed` or `per_run`, got `{other}`"),
                });
            }
        };

        Ok(Self {
            database,
            csv_root,
            manifest_path,
            ticker_file: get("TICKER_FILE_PATH").map(PathBuf::from),
            storage,
            holiday_file: get("HOLIDAY_FILE").map(PathBuf::from),
            retry,
            write_daily_rollup,
            staging,
        })
    }

    /// The ticker list is only mandatory for the fetcher.
    pub fn require_ticker_file(&self) -> Result<&Path, ConfigError> {
        self.ticker_file
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("TICKER_FILE_PATH".into()))
    }
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        name: name.into(),
        message: e.to_string(),
    })
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            name: name.into(),
            message: format!("expected a boolean, got `{other}`"),
        }),
    }
}
