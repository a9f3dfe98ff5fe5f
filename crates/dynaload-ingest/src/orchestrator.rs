//! Run-level orchestration
//!
//! Discovers the export files of one directory and runs a file job for each,
//! at most `workers` at a time. With one worker files load strictly in name
//! order. The only state shared between jobs is the grand-total tracker.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{FailurePolicy, LoaderConfig};
use crate::error::{IngestError, Result};
use crate::job::{FileJobRunner, FileReport, JobFailure};
use crate::progress::{format_elapsed, ProgressTracker};
use crate::store::ItemStore;
use crate::writer::executor_for;

/// Regular, non-hidden files directly inside `dir`, sorted by name
///
/// Symlinks are followed; a link whose target is a regular file is included
/// and a dangling link is skipped.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::source_unavailable(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::source_unavailable(dir, e))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<FileReport>,
    pub failures: Vec<JobFailure>,
    pub grand_total: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// No file failed and none was cancelled
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.reports.iter().all(|r| !r.cancelled)
    }

    pub fn cancelled(&self) -> impl Iterator<Item = &FileReport> {
        self.reports.iter().filter(|r| r.cancelled)
    }
}

pub struct Orchestrator {
    runner: FileJobRunner,
    workers: usize,
    policy: FailurePolicy,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// `runner` is rebound to `cancel` so aborts reach every job
    pub fn new(
        runner: FileJobRunner,
        workers: usize,
        policy: FailurePolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runner: runner.with_cancellation(cancel.clone()),
            workers: workers.max(1),
            policy,
            cancel,
        }
    }

    /// Validate `config`, then wire writer, tracker and runner from it
    pub fn from_config(
        config: &LoaderConfig,
        store: Arc<dyn ItemStore>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let writer = executor_for(config.mode, store, config.table.clone(), config.retry.clone());
        let progress = Arc::new(ProgressTracker::new(config.milestone_interval));
        let runner = FileJobRunner::new(writer, progress, config.batch_size)?;
        Ok(Self::new(runner, config.workers, config.failure_policy, cancel))
    }

    /// Load every file in `dir`
    pub async fn run_dir(&self, dir: &Path) -> Result<RunSummary> {
        let files = discover_files(dir)?;
        info!(dir = %dir.display(), files = files.len(), "Found {} input files", files.len());
        Ok(self.run_files(files).await)
    }

    pub async fn run_files(&self, files: Vec<PathBuf>) -> RunSummary {
        let mut reports = Vec::with_capacity(files.len());
        let mut failures = Vec::new();

        let mut jobs = stream::iter(files)
            .map(|path| {
                let runner = self.runner.clone();
                async move { runner.run(&path).await }
            })
            .buffer_unordered(self.workers);

        while let Some(result) = jobs.next().await {
            match result {
                Ok(report) => reports.push(report),
                Err(failure) => {
                    error!(
                        file = %failure.file,
                        committed = failure.committed,
                        error = %failure.error,
                        "{} failed after committing {} items",
                        failure.file,
                        failure.committed
                    );
                    if self.policy == FailurePolicy::AbortAll && !self.cancel.is_cancelled() {
                        warn!("Aborting remaining files");
                        self.cancel.cancel();
                    }
                    failures.push(failure);
                },
            }
        }

        let progress = self.runner.progress();
        let summary = RunSummary {
            reports,
            failures,
            grand_total: progress.grand_total(),
            elapsed: progress.elapsed(),
        };

        info!(
            items = summary.grand_total,
            files = summary.reports.len(),
            failed = summary.failures.len(),
            "All done ({} items) [{}]",
            summary.grand_total,
            format_elapsed(summary.elapsed)
        );
        for failure in &summary.failures {
            warn!(
                file = %failure.file,
                committed = failure.committed,
                "Not fully loaded: {}",
                failure.error
            );
        }

        summary
    }
}
