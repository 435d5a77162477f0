use clap::Parser;
use price_fetcher::io::storage_from_config;
use price_loader::processor::ManifestProcessor;
use price_store::audit::AuditLog;
use price_store::db::migrate;
use shared_utils::config::AppConfig;
use shared_utils::logging::init_tracing;
use shared_utils::manifest::ManifestFile;
use tracing::{error, info};

/// Load queued price CSV files into `stock_data`.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Load this CSV file (or every CSV in this directory) instead of the manifest.
    csv_path: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    // An unreachable database shows up as per-file failures below.
    if let Err(e) = migrate::run_all(&config.database) {
        error!(error = %e, "could not prepare database tables");
    }

    let processor = ManifestProcessor::new(
        config.database.clone(),
        storage_from_config(&config.storage)?,
        ManifestFile::new(&config.manifest_path),
        AuditLog::new(config.database.clone()),
        config.staging,
    );

    let summary = match cli.csv_path.as_deref() {
        Some(path) => processor.process_path(path).await,
        None => processor.process_manifest().await,
    };
    info!(
        loaded = summary.loaded,
        failed = summary.failed,
        skipped = summary.skipped,
        rows_inserted = summary.rows_inserted,
        "done"
    );

    // Per-file failures are in the log table; they do not change the exit code.
    Ok(())
}
