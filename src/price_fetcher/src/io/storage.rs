//! "A place to put and list files": local disk or WebHDFS.
//!
//! Paths are plain `/`-separated strings so the same partition names work on
//! both backends.

use std::path::Path;

use async_trait::async_trait;
use shared_utils::config::StorageConfig;
use snafu::{Backtrace, IntoError, ResultExt, Snafu};

use crate::io::webhdfs::WebHdfsStorage;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// A local filesystem operation failed.
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The file does not exist.
    #[snafu(display("{path} not found"))]
    NotFound { path: String, backtrace: Backtrace },

    /// Transport failure talking to WebHDFS.
    #[snafu(display("WebHDFS request for {path} failed: {source}"))]
    Http {
        path: String,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// WebHDFS answered with an unexpected status.
    #[snafu(display("WebHDFS {op} on {path} returned {status}: {message}"))]
    WebHdfs {
        op: &'static str,
        path: String,
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The configured WebHDFS address is not a usable base URL.
    #[snafu(display("Invalid WebHDFS URL {url}: {message}"))]
    InvalidUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },

    /// The HTTP client could not be built.
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `bytes` at `path`, creating parent directories and replacing any
    /// existing file.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Whether anything (file or directory) exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Whether `path` is an existing directory.
    async fn is_dir(&self, path: &str) -> Result<bool, StorageError>;

    /// Whole file contents.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Full paths of the regular files directly inside `dir`, sorted by name.
    async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError>;
}

/// Build the backend selected in configuration.
pub fn storage_from_config(config: &StorageConfig) -> Result<Box<dyn Storage>, StorageError> {
    Ok(match config {
        StorageConfig::Local => Box::new(LocalStorage),
        StorageConfig::WebHdfs { url, user } => {
            Box::new(WebHdfsStorage::new(url, user.as_deref())?)
        }
    })
}

/// Local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

fn not_found_or_io(path: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        NotFoundSnafu { path }.build()
    } else {
        IoSnafu { path }.into_error(e)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context(IoSnafu { path })?;
        }
        tokio::fs::write(path, bytes).await.context(IoSnafu { path })
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        tokio::fs::try_exists(path).await.context(IoSnafu { path })
    }

    async fn is_dir(&self, path: &str) -> Result<bool, StorageError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(not_found_or_io(path, e)),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path).await.map_err(|e| not_found_or_io(path, e))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| not_found_or_io(dir, e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.context(IoSnafu { path: dir })? {
            let file_type = entry.file_type().await.context(IoSnafu { path: dir })?;
            if file_type.is_file() {
                files.push(entry.path().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }
}
