//! Write strategies
//!
//! A [`WriteExecutor`] turns one [`Batch`] into durably accepted items. The
//! strategy is chosen once per run:
//!
//! - [`BestEffortWriter`] issues a batch put and keeps resubmitting whatever
//!   the store reports as unprocessed until nothing is left.
//! - [`TransactionalWriter`] issues one all-or-nothing transaction and never
//!   retries; a rejection fails the file job.
//!
//! Every outcome of `submit` reports how many items the store accepted, so
//! callers can advance their counters even when a batch stops part-way.
//! Cancellation is observed between continuation rounds.

use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::error::{IngestError, StoreError};
use crate::store::{ItemStore, MAX_BATCH_PUT_ITEMS, MAX_TRANSACT_ITEMS};

/// Default number of continuation rounds before giving up on a batch
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay before the first continuation round
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound for the doubling backoff
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// How batches are written to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Batch put with partial acceptance and resubmission
    #[default]
    BestEffort,
    /// All-or-nothing multi-item transaction
    Transactional,
}

impl WriteMode {
    /// Largest batch the store accepts in this mode, also the default capacity
    pub fn max_batch_size(self) -> usize {
        match self {
            WriteMode::BestEffort => MAX_BATCH_PUT_ITEMS,
            WriteMode::Transactional => MAX_TRANSACT_ITEMS,
        }
    }
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::BestEffort => write!(f, "best-effort"),
            WriteMode::Transactional => write!(f, "transactional"),
        }
    }
}

/// Backoff and ceiling for best-effort continuation rounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// `None` retries until the store accepts everything
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_retries: Some(DEFAULT_MAX_RETRIES),
        }
    }
}

impl RetryPolicy {
    /// Retry forever, still backing off between rounds
    pub fn unbounded() -> Self {
        Self {
            max_retries: None,
            ..Self::default()
        }
    }

    /// No delay between rounds
    pub fn immediate(max_retries: Option<u32>) -> Self {
        Self {
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            max_retries,
        }
    }

    /// Delay before continuation round `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    fn allows(&self, attempt: u32) -> bool {
        self.max_retries.is_none_or(|max| attempt <= max)
    }
}

/// How a submitted batch ended when the store did not fail it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// Every item of the batch is committed
    Complete(usize),
    /// Cancellation arrived between continuation rounds
    Cancelled { committed: usize },
}

impl Submitted {
    /// Items durably accepted for this batch
    pub fn committed(&self) -> usize {
        match *self {
            Submitted::Complete(committed) | Submitted::Cancelled { committed } => committed,
        }
    }
}

/// A batch that failed after the store had already accepted `committed` of its items
#[derive(Debug, Error)]
#[error("{error} ({committed} items of the batch committed)")]
pub struct BatchFailure {
    pub committed: usize,
    #[source]
    pub error: IngestError,
}

impl BatchFailure {
    fn new(committed: usize, error: impl Into<IngestError>) -> Self {
        Self {
            committed,
            error: error.into(),
        }
    }
}

/// Submits one batch and resolves it to full acceptance
#[async_trait]
pub trait WriteExecutor: Send + Sync {
    fn mode(&self) -> WriteMode;

    /// Write `batch`, giving up between rounds once `cancel` fires
    ///
    /// Both outcomes carry the number of items the store accepted, so callers
    /// can account partial progress before stopping.
    async fn submit(
        &self,
        batch: Batch,
        cancel: &CancellationToken,
    ) -> Result<Submitted, BatchFailure>;
}

/// Build the executor for `mode` over a shared store client
pub fn executor_for(
    mode: WriteMode,
    store: Arc<dyn ItemStore>,
    table: impl Into<String>,
    retry: RetryPolicy,
) -> Arc<dyn WriteExecutor> {
    match mode {
        WriteMode::BestEffort => Arc::new(BestEffortWriter::new(store, table, retry)),
        WriteMode::Transactional => Arc::new(TransactionalWriter::new(store, table)),
    }
}

pub struct BestEffortWriter {
    store: Arc<dyn ItemStore>,
    table: String,
    retry: RetryPolicy,
}

impl BestEffortWriter {
    pub fn new(store: Arc<dyn ItemStore>, table: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            store,
            table: table.into(),
            retry,
        }
    }
}

#[async_trait]
impl WriteExecutor for BestEffortWriter {
    fn mode(&self) -> WriteMode {
        WriteMode::BestEffort
    }

    async fn submit(
        &self,
        batch: Batch,
        cancel: &CancellationToken,
    ) -> Result<Submitted, BatchFailure> {
        let mut outcome = self
            .store
            .batch_put(&self.table, batch.into_records())
            .await
            .map_err(|e| BatchFailure::new(0, e))?;
        let mut committed = outcome.accepted;
        let mut attempt = 0u32;

        while !outcome.is_complete() {
            attempt += 1;
            let pending = outcome.unprocessed.len();

            if !self.retry.allows(attempt) {
                warn!(pending, attempts = attempt - 1, "Giving up on unprocessed items");
                return Err(BatchFailure::new(
                    committed,
                    StoreError::RetriesExhausted {
                        remaining: pending,
                        attempts: attempt - 1,
                    },
                ));
            }

            let delay = self.retry.backoff(attempt);
            debug!(
                pending,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Resubmitting unprocessed items"
            );

            // An in-flight call always runs to completion so `committed` stays exact.
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };
            if cancelled {
                warn!(pending, committed, "Cancelled with items still unprocessed");
                return Ok(Submitted::Cancelled { committed });
            }

            let resend = std::mem::take(&mut outcome.unprocessed);
            outcome = self
                .store
                .batch_put_continue(&self.table, resend)
                .await
                .map_err(|e| BatchFailure::new(committed, e))?;
            committed += outcome.accepted;

            if outcome.unprocessed.len() > pending {
                return Err(BatchFailure::new(
                    committed,
                    StoreError::malformed(
                        "BatchWriteItem",
                        format!(
                            "{} items unprocessed after resubmitting {}",
                            outcome.unprocessed.len(),
                            pending
                        ),
                    ),
                ));
            }
        }

        if attempt > 0 {
            debug!(items = committed, rounds = attempt, "Batch accepted after resubmission");
        }
        Ok(Submitted::Complete(committed))
    }
}

pub struct TransactionalWriter {
    store: Arc<dyn ItemStore>,
    table: String,
}

impl TransactionalWriter {
    pub fn new(store: Arc<dyn ItemStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

#[async_trait]
impl WriteExecutor for TransactionalWriter {
    fn mode(&self) -> WriteMode {
        WriteMode::Transactional
    }

    /// One call, never retried; a rejected transaction commits nothing
    async fn submit(
        &self,
        batch: Batch,
        _cancel: &CancellationToken,
    ) -> Result<Submitted, BatchFailure> {
        let size = batch.len();
        self.store
            .transact_write(&self.table, batch.into_records())
            .await
            .map_err(|e| BatchFailure::new(0, e))?;
        Ok(Submitted::Complete(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_capacities() {
        assert_eq!(WriteMode::BestEffort.max_batch_size(), 25);
        assert_eq!(WriteMode::Transactional.max_batch_size(), 100);
        assert_eq!(WriteMode::default(), WriteMode::BestEffort);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(750),
            max_retries: Some(5),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(750));
        assert_eq!(policy.backoff(40), Duration::from_millis(750));
    }

    #[test]
    fn test_retry_ceiling() {
        let bounded = RetryPolicy::immediate(Some(2));
        assert!(bounded.allows(1));
        assert!(bounded.allows(2));
        assert!(!bounded.allows(3));

        let unbounded = RetryPolicy::unbounded();
        assert!(unbounded.allows(u32::MAX));
    }
}
