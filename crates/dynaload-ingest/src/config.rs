//! Loader configuration
//!
//! Values come from the command line (with environment fallbacks, see
//! `main.rs`); this module holds the validated shape and its defaults.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{IngestError, Result};
use crate::progress::DEFAULT_MILESTONE_INTERVAL;
use crate::store::StoreConfig;
use crate::writer::{RetryPolicy, WriteMode};

// ============================================================================
// Loader Configuration Constants
// ============================================================================

/// Default number of files loaded concurrently (sequential).
pub const DEFAULT_WORKERS: usize = 1;

/// What the orchestrator does when a file job fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep loading the remaining files and report failures at the end
    #[default]
    #[value(name = "continue")]
    ContinueAndReport,
    /// Stop scheduling new files and cancel running ones at their next safe point
    #[value(name = "abort")]
    AbortAll,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::ContinueAndReport => write!(f, "continue"),
            FailurePolicy::AbortAll => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Directory holding the gzip export files (not searched recursively)
    pub source_dir: PathBuf,
    /// Target table
    pub table: String,
    pub store: StoreConfig,
    pub mode: WriteMode,
    /// Records per write call, at most `mode.max_batch_size()`
    pub batch_size: usize,
    pub milestone_interval: u64,
    /// Files loaded concurrently
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub retry: RetryPolicy,
}

impl LoaderConfig {
    pub fn new(source_dir: impl Into<PathBuf>, table: impl Into<String>, store: StoreConfig) -> Self {
        let mode = WriteMode::default();
        Self {
            source_dir: source_dir.into(),
            table: table.into(),
            store,
            mode,
            batch_size: mode.max_batch_size(),
            milestone_interval: DEFAULT_MILESTONE_INTERVAL,
            workers: DEFAULT_WORKERS,
            failure_policy: FailurePolicy::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Switch write mode, resetting the batch size to the mode's maximum
    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self.batch_size = mode.max_batch_size();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_milestone_interval(mut self, interval: u64) -> Self {
        self.milestone_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(IngestError::config("table name must not be empty"));
        }
        let max = self.mode.max_batch_size();
        if self.batch_size == 0 || self.batch_size > max {
            return Err(IngestError::config(format!(
                "batch size {} is outside 1..={} for {} mode",
                self.batch_size, max, self.mode
            )));
        }
        if self.milestone_interval == 0 {
            return Err(IngestError::config("milestone interval must be positive"));
        }
        if self.workers == 0 {
            return Err(IngestError::config("worker count must be positive"));
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(IngestError::config("initial backoff exceeds maximum backoff"));
        }
        Ok(())
    }
}
