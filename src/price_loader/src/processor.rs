//! Drives loads: the queued manifest, or one explicit file or directory.
//!
//! Every file gets its own connection and its own `LOAD_CSV` log record, so
//! one bad file never stops the rest of the pass.

use std::time::Instant;

use chrono::Utc;
use price_fetcher::io::Storage;
use price_store::audit::AuditLog;
use price_store::db::connection::connect;
use price_store::models::{LogRecord, Status, Step};
use price_store::partition::PartitionKey;
use price_store::table_ref::{TableRef, TableRefError};
use price_store::with_session;
use shared_utils::config::{DbConfig, StagingMode};
use shared_utils::manifest::ManifestFile;
use tracing::{info, warn};

use crate::csv_stage::parse_csv;
use crate::engine::{LoadError, LoadOutcome, ReconcileEngine};

/// Tallies for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rows_inserted: usize,
}

pub struct ManifestProcessor {
    db: DbConfig,
    storage: Box<dyn Storage>,
    manifest: ManifestFile,
    audit: AuditLog,
    staging_mode: StagingMode,
}

impl ManifestProcessor {
    pub fn new(
        db: DbConfig,
        storage: Box<dyn Storage>,
        manifest: ManifestFile,
        audit: AuditLog,
        staging_mode: StagingMode,
    ) -> Self {
        Self {
            db,
            storage,
            manifest,
            audit,
            staging_mode,
        }
    }

    /// Load every path listed in the manifest, then drop the processed copy.
    ///
    /// The manifest is claimed (renamed aside) before it is read, so paths a
    /// concurrent fetch appends meanwhile stay queued for the next run. A
    /// missing manifest means nothing is queued. Entries are processed in
    /// order, duplicates included.
    pub async fn process_manifest(&self) -> LoadSummary {
        let claim = match self.manifest.claim() {
            Ok(Some(claim)) => claim,
            Ok(None) => {
                info!(manifest = %self.manifest.path().display(), "no manifest, nothing to load");
                return LoadSummary::default();
            }
            Err(e) => {
                warn!(manifest = %self.manifest.path().display(), error = %e, "could not claim manifest");
                return LoadSummary::default();
            }
        };
        if claim.is_resumed() {
            warn!(
                manifest = %claim.path().display(),
                "resuming a manifest left by an interrupted run; newer entries wait for the next run"
            );
        }

        info!(files = claim.entries().len(), "processing manifest");
        let summary = self.process_entries(claim.entries()).await;

        let claimed_path = claim.path().to_path_buf();
        match claim.release() {
            Ok(()) => info!(manifest = %claimed_path.display(), "manifest cleared"),
            Err(e) => warn!(
                manifest = %claimed_path.display(),
                error = %e,
                "could not remove processed manifest"
            ),
        }
        summary
    }

    /// Load one file, or every `*.csv` directly inside a directory in name
    /// order. The manifest is not touched.
    pub async fn process_path(&self, path: &str) -> LoadSummary {
        match self.storage.is_dir(path).await {
            Ok(true) => match self.storage.list(path).await {
                Ok(files) => {
                    let csvs: Vec<String> = files
                        .into_iter()
                        .filter(|f| f.to_ascii_lowercase().ends_with(".csv"))
                        .collect();
                    info!(dir = path, files = csvs.len(), "loading directory");
                    self.process_entries(&csvs).await
                }
                Err(e) => {
                    warn!(dir = path, error = %e, "could not list directory");
                    LoadSummary {
                        failed: 1,
                        ..LoadSummary::default()
                    }
                }
            },
            _ => self.process_entries(&[path.to_string()]).await,
        }
    }

    async fn process_entries(&self, paths: &[String]) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for path in paths {
            let started = Instant::now();
            let key = PartitionKey::from_path(path).ok();
            let date = key
                .as_ref()
                .map(PartitionKey::date)
                .unwrap_or_else(|| Utc::now().date_naive());
            let tickers = key
                .as_ref()
                .map(|k| k.ticker_symbol().unwrap_or("ALL").to_string())
                .unwrap_or_default();

            match self.storage.exists(path).await {
                Ok(false) => {
                    summary.skipped += 1;
                    self.audit.record(&LogRecord::for_day(
                        Step::LoadCsv,
                        Status::Skip,
                        date,
                        tickers,
                        format!("{path}: file not found"),
                    ));
                    continue;
                }
                Ok(true) => {}
                Err(e) => {
                    summary.failed += 1;
                    self.audit.record(
                        &LogRecord::for_day(Step::LoadCsv, Status::Fail, date, tickers, format!("{path}: {e}"))
                            .with_duration(started.elapsed()),
                    );
                    continue;
                }
            }

            let record = match self.load_file(path).await {
                Ok(outcome) => {
                    summary.loaded += 1;
                    summary.rows_inserted += outcome.rows_inserted;
                    LogRecord::for_day(
                        Step::LoadCsv,
                        Status::Success,
                        date,
                        tickers,
                        format!(
                            "{path}: staged {}, already present {}, inserted {}",
                            outcome.rows_staged, outcome.rows_already_present, outcome.rows_inserted
                        ),
                    )
                }
                Err(e) => {
                    summary.failed += 1;
                    LogRecord::for_day(
                        Step::LoadCsv,
                        Status::Fail,
                        date,
                        tickers,
                        format!("{path}: {e} ({})", e.stage()),
                    )
                }
            };
            self.audit.record(&record.with_duration(started.elapsed()));
        }
        summary
    }

    /// Read, parse and reconcile one file on a fresh connection.
    pub async fn load_file(&self, path: &str) -> Result<LoadOutcome, LoadError> {
        PartitionKey::from_path(path)?;
        let bytes = self.storage.read(path).await?;
        let batch = parse_csv(&bytes)?;

        let engine = self.engine()?;
        let mut conn = connect(&self.db)?;
        with_session!(&mut conn, |s| engine.load_batch(s, &batch))
    }

    fn engine(&self) -> Result<ReconcileEngine, TableRefError> {
        let schema = self.db.schema();
        Ok(ReconcileEngine::new(
            TableRef::destination(schema)?,
            TableRef::staging(schema, self.staging_mode)?,
        ))
    }
}
