//! Per-file load job
//!
//! A job streams one export file through the accumulator and the write
//! executor, accounting every committed batch in both the file counter and the
//! shared grand total:
//!
//! ```text
//! Starting -> Streaming -> Flushing -> Done
//!                 |            |
//!                 +-> Failed <-+
//!                 +-> Cancelled
//! ```
//!
//! A failure aborts only this file. Batches committed before it stay
//! committed; the failure reports how many items that was.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{Batch, BatchAccumulator};
use crate::error::{IngestError, Result};
use crate::progress::{format_elapsed, FileCounter, ProgressTracker};
use crate::source::{spawn_reader, GzipJsonLinesSource, RecordSource};
use crate::writer::{Submitted, WriteExecutor};

/// Decoded records buffered between the reader thread and the job
pub const READ_AHEAD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Starting,
    Streaming,
    Flushing,
    Done,
    Failed,
    Cancelled,
}

/// Outcome of a job that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file: String,
    /// Items confirmed committed
    pub committed: u64,
    /// Write calls that completed
    pub batches: u64,
    pub elapsed: Duration,
    /// Stopped early on request; everything counted in `committed` is durable
    pub cancelled: bool,
}

/// A job that stopped on a fatal error
#[derive(Debug, Error)]
#[error("{file}: failed after committing {committed} items: {error}")]
pub struct JobFailure {
    pub file: String,
    pub committed: u64,
    #[source]
    pub error: IngestError,
}

pub type JobResult = std::result::Result<FileReport, JobFailure>;

/// Runs file jobs against one write executor and one shared tracker
#[derive(Clone)]
pub struct FileJobRunner {
    writer: Arc<dyn WriteExecutor>,
    progress: Arc<ProgressTracker>,
    batch_size: usize,
    cancel: CancellationToken,
}

impl FileJobRunner {
    /// `batch_size` must lie within `1..=` the writer mode's maximum
    pub fn new(
        writer: Arc<dyn WriteExecutor>,
        progress: Arc<ProgressTracker>,
        batch_size: usize,
    ) -> Result<Self> {
        let mode = writer.mode();
        let max = mode.max_batch_size();
        if batch_size == 0 || batch_size > max {
            return Err(IngestError::config(format!(
                "batch size {} is outside 1..={} for {} mode",
                batch_size, max, mode
            )));
        }

        Ok(Self {
            writer,
            progress,
            batch_size,
            cancel: CancellationToken::new(),
        })
    }

    /// Stop pulling records once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Load one gzip export file
    pub async fn run(&self, path: &Path) -> JobResult {
        let file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let job = Job::start(self, &file);
        if self.cancel.is_cancelled() {
            return Ok(job.cancelled());
        }

        match GzipJsonLinesSource::open(path) {
            Ok(source) => self.drive(job, source).await,
            Err(error) => Err(job.fail(error)),
        }
    }

    /// Load records from an arbitrary source, labelled `file` in reports
    pub async fn run_source<S>(&self, file: &str, source: S) -> JobResult
    where
        S: RecordSource + 'static,
    {
        let job = Job::start(self, file);
        self.drive(job, source).await
    }

    async fn drive<S>(&self, mut job: Job<'_>, source: S) -> JobResult
    where
        S: RecordSource + 'static,
    {
        let mut records = spawn_reader(source, READ_AHEAD);
        job.transition(JobState::Streaming);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(job.cancelled()),
                next = records.recv() => next,
            };

            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(error)) => return Err(job.fail(error)),
                None => break,
            };

            if let Some(batch) = job.accumulator.offer(record) {
                match job.commit(batch).await {
                    Ok(Submitted::Complete(_)) => {},
                    Ok(Submitted::Cancelled { .. }) => return Ok(job.cancelled()),
                    Err(error) => return Err(job.fail(error)),
                }
            }
        }

        job.transition(JobState::Flushing);
        if let Some(batch) = job.accumulator.flush() {
            match job.commit(batch).await {
                Ok(Submitted::Complete(_)) => {},
                Ok(Submitted::Cancelled { .. }) => return Ok(job.cancelled()),
                Err(error) => return Err(job.fail(error)),
            }
        }

        Ok(job.done())
    }
}

struct Job<'a> {
    runner: &'a FileJobRunner,
    file: String,
    state: JobState,
    accumulator: BatchAccumulator,
    counter: FileCounter,
    started: Instant,
}

impl<'a> Job<'a> {
    fn start(runner: &'a FileJobRunner, file: &str) -> Self {
        info!(file, mode = %runner.writer.mode(), "{} start", file);
        Self {
            runner,
            file: file.to_string(),
            state: JobState::Starting,
            accumulator: BatchAccumulator::new(runner.batch_size),
            counter: FileCounter::default(),
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: JobState) {
        debug!(file = %self.file, from = ?self.state, to = ?next, "Job state change");
        self.state = next;
    }

    /// Submit `batch` and account whatever the store accepted, even when it
    /// stopped part-way
    async fn commit(&mut self, batch: Batch) -> Result<Submitted> {
        match self.runner.writer.submit(batch, &self.runner.cancel).await {
            Ok(submitted) => {
                self.account(submitted.committed() as u64);
                Ok(submitted)
            },
            Err(failure) => {
                self.account(failure.committed as u64);
                Err(failure.error)
            },
        }
    }

    fn account(&mut self, committed: u64) {
        if committed == 0 {
            return;
        }
        self.counter.add_batch(committed);

        let progress = &self.runner.progress;
        let accepted = progress.record_accepted(committed);
        if accepted.is_milestone() {
            info!(
                grand_total = accepted.grand_total,
                "Done {} items [{}]",
                accepted.grand_total,
                format_elapsed(progress.elapsed())
            );
        }
    }

    fn report(&self, cancelled: bool) -> FileReport {
        FileReport {
            file: self.file.clone(),
            committed: self.counter.items,
            batches: self.counter.batches,
            elapsed: self.started.elapsed(),
            cancelled,
        }
    }

    fn done(mut self) -> FileReport {
        self.transition(JobState::Done);
        let report = self.report(false);
        info!(
            file = %report.file,
            items = report.committed,
            "{} done ({} items) [{}]",
            report.file,
            report.committed,
            format_elapsed(report.elapsed)
        );
        report
    }

    fn cancelled(mut self) -> FileReport {
        self.transition(JobState::Cancelled);
        let report = self.report(true);
        warn!(
            file = %report.file,
            committed = report.committed,
            dropped = self.accumulator.pending(),
            "{} cancelled after {} items",
            report.file,
            report.committed
        );
        report
    }

    fn fail(mut self, error: IngestError) -> JobFailure {
        self.transition(JobState::Failed);
        JobFailure {
            file: self.file,
            committed: self.counter.items,
            error,
        }
    }
}
