use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use adoc_core::{
    load_batch, load_config, load_config_from_env, reconciliation_report, staging_report,
    validate_config, ArchivesSpaceClient, BagStager, Config, ConfigError, LinkBuilder,
    PipelineProgress, PipelineSummary, ReconcileStatus, ReconcileSummary, ReconciliationEngine,
    RowProcessor, SanitizedConfig, Stager, StagingParams, TransferRunner, TRANSFER_LOG_DIR,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when neither `--config` nor `ADOC_CONFIG` is set
const DEFAULT_CONFIG: &str = "adoc.toml";

/// Log file written by `stage`, renamed after the batch once the run ends
const STAGE_LOG_FILE: &str = "adoc-stage.log";

/// Archival digitization batch tooling
#[derive(Parser)]
#[command(name = "adoc", version, about = "Check, stage and transfer digitization batches")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "ADOC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the work order's digital objects exist in ArchivesSpace
    Check {
        /// Source package containing the metadata directory
        #[arg(long)]
        source: PathBuf,

        /// Concurrent registry lookups (overrides reconcile.workers)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Build transfer packages for every work order row
    Stage {
        /// Source package to stage
        #[arg(long)]
        source_location: PathBuf,

        /// Staging location the packages are written to
        #[arg(long)]
        staging_location: PathBuf,

        /// Concurrent workers (overrides staging.workers)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Send staged packages matching a pattern to the transfer program
    Transfer {
        /// Staging location holding the packages
        #[arg(long)]
        staging_location: PathBuf,

        /// Regular expression package directory names must match
        #[arg(long)]
        regexp: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_file = matches!(cli.command, Commands::Stage { .. }).then(|| Path::new(STAGE_LOG_FILE));
    if let Err(e) = init_logging(log_file) {
        eprintln!("adoc: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {:?}", path))?;
            Some(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    info!(version = VERSION, "adoc starting");

    match cli.command {
        Commands::Check { source, workers } => {
            let config = load(&config_path, true)?;
            check(&config, &source, workers).await
        }
        Commands::Stage {
            source_location,
            staging_location,
            workers,
        } => {
            let config = load(&config_path, false)?;
            stage(&config, &source_location, &staging_location, workers).await
        }
        Commands::Transfer {
            staging_location,
            regexp,
        } => {
            let config = load(&config_path, false)?;
            transfer(&config, &staging_location, &regexp).await
        }
    }
}

/// Loads and validates the configuration. Without a file, `stage` and
/// `transfer` run on defaults plus environment overrides.
fn load(path: &Path, required: bool) -> Result<Config> {
    info!("Loading configuration from {:?}", path);
    let config = match load_config(path) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) if !required => {
            info!("No configuration file, using defaults");
            load_config_from_env().context("Failed to read configuration from environment")?
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load config from {:?}", path));
        }
    };

    validate_config(&config).context("Configuration validation failed")?;
    info!(config = ?SanitizedConfig::from(&config), "Configuration loaded");
    Ok(config)
}

async fn check(config: &Config, source: &Path, workers: Option<usize>) -> Result<()> {
    let registry = config
        .registry
        .as_ref()
        .context("The [registry] section is required for check")?;

    let batch = load_batch(source)
        .await
        .context("Failed to load batch metadata")?;
    let resource_id = batch.transfer_info.resource_id().to_string();

    let mut reconcile_config = config.reconcile.clone();
    if let Some(workers) = workers {
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        reconcile_config = reconcile_config.with_workers(workers);
    }

    let client = ArchivesSpaceClient::new(registry).context("Failed to create registry client")?;
    let engine = ReconciliationEngine::new(
        Arc::new(client),
        reconcile_config,
        LinkBuilder::new(&registry.public_url),
    );

    let records = engine.reconcile(&batch.work_order, &resource_id).await;
    let summary = ReconcileSummary::from_records(&records);

    let report_path = config
        .report
        .dir
        .join(format!("{}-aspace-check.tsv", batch.codes.prefix()));
    reconciliation_report(&records)
        .write_to(&report_path)
        .await
        .context("Failed to write reconciliation report")?;

    info!(
        rows = summary.rows,
        records = summary.records,
        ok = summary.count(ReconcileStatus::Ok),
        "aspace check complete"
    );
    println!(
        "{} rows checked, {} of {} records OK; report at {}",
        summary.rows,
        summary.count(ReconcileStatus::Ok),
        summary.records,
        report_path.display()
    );
    Ok(())
}

async fn ensure_directory(path: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Cannot access {:?}", path))?;
    if !meta.is_dir() {
        bail!("{:?} is not a directory", path);
    }
    Ok(())
}

async fn stage(
    config: &Config,
    source: &Path,
    staging: &Path,
    workers: Option<usize>,
) -> Result<()> {
    info!("Checking source and staging locations");
    ensure_directory(source).await?;
    ensure_directory(staging).await?;

    let batch = load_batch(source)
        .await
        .context("Failed to load batch metadata")?;
    let prefix = batch.codes.prefix();

    let stager = BagStager::new(config.staging.stager.clone());
    stager
        .validate(staging)
        .await
        .context("Staging location is not usable")?;

    let params = StagingParams {
        source: source.to_path_buf(),
        staging_location: staging.to_path_buf(),
        partner_code: batch.codes.partner.clone(),
        resource_code: batch.codes.resource.clone(),
        work_order: Arc::new(batch.work_order),
        transfer_info: Arc::new(batch.transfer_info),
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing rows in progress");
                cancel.cancel();
            }
        })
    };

    let (progress_tx, mut progress_rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            if let PipelineProgress::RowCompleted {
                component_id,
                success,
                completed,
                total,
                ..
            } = update
            {
                let state = if success { "staged" } else { "FAILED" };
                println!("[{}/{}] {} {}", completed, total, component_id, state);
            }
        }
    });

    let processor = RowProcessor::new(config.staging.processor.clone(), stager)
        .with_progress(progress_tx)
        .with_cancellation(cancel.clone());
    let concurrency = workers.unwrap_or(config.staging.processor.workers);
    let results = processor
        .process_with_concurrency(params, concurrency)
        .await
        .context("Staging run failed to start")?;
    drop(processor);
    interrupt.abort();
    let _ = printer.await;

    let report_path = config
        .report
        .dir
        .join(format!("{}-adoc-stage.tsv", prefix));
    staging_report(&results)
        .write_to(&report_path)
        .await
        .context("Failed to write staging report")?;

    let summary = PipelineSummary::from_results(&results);
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "adoc-stage complete for {}",
        prefix
    );

    tokio::fs::rename(STAGE_LOG_FILE, format!("{}-adoc-stage.log", prefix))
        .await
        .context("Failed to rename stage log")?;

    if cancel.is_cancelled() {
        bail!(
            "staging cancelled: {} of {} rows staged",
            summary.succeeded,
            summary.total
        );
    }
    Ok(())
}

async fn transfer(config: &Config, staging: &Path, regexp: &str) -> Result<()> {
    let runner = TransferRunner::new(config.transfer.clone());
    let outcomes = runner
        .run(staging, regexp)
        .await
        .context("Transfer could not start")?;

    let log_dir = config.report.dir.join(TRANSFER_LOG_DIR);
    for outcome in &outcomes {
        match outcome.write_log(&log_dir).await {
            Ok(path) => info!(bag = %outcome.bag, log = %path.display(), "Transfer output saved"),
            Err(e) => warn!(bag = %outcome.bag, error = %e, "Could not save transfer output"),
        }
        match &outcome.error {
            None => println!("transferred {}", outcome.bag),
            Some(e) => println!("failed {}: {}", outcome.bag, e),
        }
    }

    let failed = outcomes.iter().filter(|o| !o.success).count();
    if failed > 0 {
        bail!("{} of {} packages failed to transfer", failed, outcomes.len());
    }
    info!(packages = outcomes.len(), "Transfer complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_stage() {
        let cli = Cli::try_parse_from([
            "adoc",
            "stage",
            "--source-location",
            "/sip/fales_mss123",
            "--staging-location",
            "/staging",
            "--workers",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Stage {
                source_location,
                staging_location,
                workers,
            } => {
                assert_eq!(source_location, PathBuf::from("/sip/fales_mss123"));
                assert_eq!(staging_location, PathBuf::from("/staging"));
                assert_eq!(workers, Some(3));
            }
            _ => panic!("expected stage"),
        }
    }

    #[test]
    fn test_transfer_requires_regexp() {
        assert!(Cli::try_parse_from(["adoc", "transfer", "--staging-location", "/staging"]).is_err());
    }

    #[test]
    fn test_missing_config_falls_back_for_stage() {
        let config = load(Path::new("/nonexistent/adoc.toml"), false).unwrap();
        assert_eq!(config.staging.processor.workers, 5);
    }

    #[test]
    fn test_missing_config_fatal_for_check() {
        assert!(load(Path::new("/nonexistent/adoc.toml"), true).is_err());
    }
}
