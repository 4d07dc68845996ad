//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Non-empty submissions started
    submissions: AtomicU64,
    /// Chunks committed to the sink
    chunks_committed: AtomicU64,
    /// Items committed to the sink
    items_committed: AtomicU64,
    /// Sink calls that failed
    sink_failures: AtomicU64,
    /// Submissions stopped by cancellation
    cancellations: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get submission count
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::Relaxed)
    }

    /// Increment submission count
    pub fn inc_submissions(&self) {
        self.submissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get committed chunk count
    pub fn chunks_committed(&self) -> u64 {
        self.chunks_committed.load(Ordering::Relaxed)
    }

    /// Get committed item count
    pub fn items_committed(&self) -> u64 {
        self.items_committed.load(Ordering::Relaxed)
    }

    /// Record one committed chunk of `items` items
    pub fn record_commit(&self, items: usize) {
        self.chunks_committed.fetch_add(1, Ordering::Relaxed);
        self.items_committed.fetch_add(items as u64, Ordering::Relaxed);
    }

    /// Get sink failure count
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Increment sink failure count
    pub fn inc_sink_failures(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get cancellation count
    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }

    /// Increment cancellation count
    pub fn inc_cancellations(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submissions: self.submissions(),
            chunks_committed: self.chunks_committed(),
            items_committed: self.items_committed(),
            sink_failures: self.sink_failures(),
            cancellations: self.cancellations(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submissions: u64,
    pub chunks_committed: u64,
    pub items_committed: u64,
    pub sink_failures: u64,
    pub cancellations: u64,
}
