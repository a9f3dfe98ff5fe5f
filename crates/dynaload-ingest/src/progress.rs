//! Progress accounting
//!
//! The grand total is shared by every file job of a run. Milestones are
//! derived from the value returned by `fetch_add`, so each interval boundary
//! is claimed by exactly one increment even when jobs run concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default number of accepted items between milestone notifications
pub const DEFAULT_MILESTONE_INTERVAL: u64 = 100;

/// Result of adding accepted items to the grand total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Grand total right after this increment
    pub grand_total: u64,
    /// Interval boundaries crossed by this increment
    pub milestones: u64,
}

impl Accepted {
    pub fn is_milestone(&self) -> bool {
        self.milestones > 0
    }
}

/// Process-wide accepted-item counter, shared behind an `Arc`
#[derive(Debug)]
pub struct ProgressTracker {
    total: AtomicU64,
    interval: u64,
    started: Instant,
}

impl ProgressTracker {
    /// `interval` of zero is treated as one
    pub fn new(interval: u64) -> Self {
        Self {
            total: AtomicU64::new(0),
            interval: interval.max(1),
            started: Instant::now(),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn record_accepted(&self, n: u64) -> Accepted {
        let previous = self.total.fetch_add(n, Ordering::AcqRel);
        let grand_total = previous + n;
        Accepted {
            grand_total,
            milestones: grand_total / self.interval - previous / self.interval,
        }
    }

    pub fn grand_total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Time since the tracker was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MILESTONE_INTERVAL)
    }
}

/// Accepted items for a single file; owned by one job
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileCounter {
    pub items: u64,
    pub batches: u64,
}

impl FileCounter {
    pub fn add_batch(&mut self, items: u64) {
        self.items += items;
        self.batches += 1;
    }
}

/// `HH:MM:SS`, hours keep counting past a day
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
