//! Dynaload - DynamoDB export loader

use anyhow::{Context, Result};
use clap::Parser;
use dynaload_common::logging::{init_logging, LogConfig, LogLevel};
use dynaload_ingest::{
    config::{FailurePolicy, LoaderConfig},
    orchestrator::Orchestrator,
    store::{config::DEFAULT_REGION, DynamoStore, StoreConfig},
    writer::{RetryPolicy, WriteMode, DEFAULT_MAX_RETRIES},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "dynaload")]
#[command(author, version, about = "Load gzip DynamoDB exports into a table")]
struct Cli {
    /// Directory holding the export files
    #[arg(short, long, env = "DYNALOAD_SOURCE_DIR")]
    source_dir: PathBuf,

    /// Target table
    #[arg(short, long, env = "DYNALOAD_TABLE")]
    table: String,

    /// Custom endpoint, e.g. http://localhost:4566/ for LocalStack
    #[arg(long, env = "DYNALOAD_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Write strategy
    #[arg(short, long, value_enum, env = "DYNALOAD_MODE", default_value_t = WriteMode::BestEffort)]
    mode: WriteMode,

    /// Records per write call (defaults to the mode's maximum)
    #[arg(short, long, env = "DYNALOAD_BATCH_SIZE")]
    batch_size: Option<usize>,

    /// Accepted items between progress lines
    #[arg(long, env = "DYNALOAD_MILESTONE_INTERVAL", default_value_t = 100)]
    milestone_interval: u64,

    /// Files loaded concurrently
    #[arg(short, long, env = "DYNALOAD_WORKERS", default_value_t = 1)]
    workers: usize,

    /// What to do when a file fails
    #[arg(long, value_enum, env = "DYNALOAD_FAILURE_POLICY", default_value_t = FailurePolicy::ContinueAndReport)]
    failure_policy: FailurePolicy,

    /// Continuation rounds for unprocessed items before a batch fails
    #[arg(long, env = "DYNALOAD_MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Resubmit unprocessed items until the store accepts them
    #[arg(long, conflicts_with = "max_retries")]
    unbounded_retries: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn loader_config(&self) -> LoaderConfig {
        let store = StoreConfig {
            endpoint: self.endpoint.clone(),
            region: self.region.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        };

        let retry = if self.unbounded_retries {
            RetryPolicy::unbounded()
        } else {
            RetryPolicy {
                max_retries: Some(self.max_retries),
                ..RetryPolicy::default()
            }
        };

        let config = LoaderConfig::new(&self.source_dir, &self.table, store)
            .with_mode(self.mode)
            .with_milestone_interval(self.milestone_interval)
            .with_workers(self.workers)
            .with_failure_policy(self.failure_policy)
            .with_retry(retry);

        match self.batch_size {
            Some(size) => config.with_batch_size(size),
            None => config,
        }
    }
}

/// First Ctrl-C cancels the run cooperatively, a second one exits at once
async fn watch_interrupts(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupt received, stopping after in-flight write calls return (Ctrl-C again to force)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        error!("Second interrupt, exiting without waiting for in-flight writes");
        std::process::exit(130);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::default()
        .with_level(log_level)
        .with_file_prefix("dynaload")
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = cli.loader_config();
    config.validate().context("Invalid configuration")?;
    info!(
        table = %config.table,
        mode = %config.mode,
        batch_size = config.batch_size,
        workers = config.workers,
        "Loading {} into {}",
        config.source_dir.display(),
        config.table
    );

    let store = Arc::new(DynamoStore::new(&config.store).await);
    let cancel = CancellationToken::new();

    tokio::spawn(watch_interrupts(cancel.clone()));

    let summary = Orchestrator::from_config(&config, store, cancel)?
        .run_dir(&config.source_dir)
        .await?;

    if !summary.is_success() {
        let failed = summary.failures.len();
        let cancelled = summary.cancelled().count();
        error!(failed, cancelled, "Load incomplete");
        anyhow::bail!("{} files failed, {} cancelled", failed, cancelled);
    }

    Ok(())
}
