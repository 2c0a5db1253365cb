//! Atomic counters for one profiling run.
//!
//! Counters are incremented silently at the call site. Call
//! [`RunMetrics::flush`] to emit current values as a single
//! `tracing::info!` event at the end of a run.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lightweight atomic counters, shared by the tasks of one run.
#[derive(Debug, Default)]
pub struct RunMetrics {
    items_classified: AtomicU64,
    items_failed: AtomicU64,
    item_timeouts: AtomicU64,
    batches_dispatched: AtomicU64,
    retries_dispatched: AtomicU64,
    sink_failures: AtomicU64,
}

/// Point-in-time copy of [`RunMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub items_classified: u64,
    pub items_failed: u64,
    pub item_timeouts: u64,
    pub batches_dispatched: u64,
    pub retries_dispatched: u64,
    pub sink_failures: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// An item got a schema-valid response.
    pub fn inc_items_classified(&self) {
        self.items_classified.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "items_classified", "counter incremented");
    }

    pub fn inc_items_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "items_failed", "counter incremented");
    }

    pub fn inc_item_timeouts(&self) {
        self.item_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "item_timeouts", "counter incremented");
    }

    /// One batch task started, first attempt or retry.
    pub fn inc_batches_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries_dispatched(&self) {
        self.retries_dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retries_dispatched", "counter incremented");
    }

    pub fn inc_sink_failures(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_classified: self.items_classified.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            item_timeouts: self.item_timeouts.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            retries_dispatched: self.retries_dispatched.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self, run_id: &str) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            run_id = %run_id,
            items_classified = s.items_classified,
            items_failed = s.items_failed,
            item_timeouts = s.item_timeouts,
            batches_dispatched = s.batches_dispatched,
            retries_dispatched = s.retries_dispatched,
            sink_failures = s.sink_failures,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = RunMetrics::new();
        m.inc_items_classified();
        m.inc_items_classified();
        m.inc_items_failed();
        m.inc_item_timeouts();
        m.inc_retries_dispatched();

        let s = m.snapshot();
        assert_eq!(s.items_classified, 2);
        assert_eq!(s.items_failed, 1);
        assert_eq!(s.item_timeouts, 1);
        assert_eq!(s.retries_dispatched, 1);
        assert_eq!(s.sink_failures, 0);
    }

    #[test]
    fn fresh_snapshot_is_zero() {
        assert_eq!(RunMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
