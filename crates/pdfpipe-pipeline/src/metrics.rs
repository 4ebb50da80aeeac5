//! Process-wide counters surfaced by the health/metrics endpoint. Cheap,
//! lock-free counters rather than a full metrics-crate integration,
//! mirroring this codebase's own `WorkerMetrics` style of plain atomics
//! behind a snapshot struct.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct PipelineMetrics {
    items_analyzed: AtomicU64,
    items_split: AtomicU64,
    parts_converted: AtomicU64,
    parts_failed: AtomicU64,
    merges_triggered: AtomicU64,
    items_completed: AtomicU64,
    items_failed: AtomicU64,
    retries_published: AtomicU64,
    dead_lettered: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub items_analyzed: u64,
    pub items_split: u64,
    pub parts_converted: u64,
    pub parts_failed: u64,
    pub merges_triggered: u64,
    pub items_completed: u64,
    pub items_failed: u64,
    pub retries_published: u64,
    pub dead_lettered: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_analyzed(&self) {
        self.items_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_split(&self) {
        self.items_split.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_part_converted(&self) {
        self.parts_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_part_failed(&self) {
        self.parts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge_triggered(&self) {
        self.merges_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_completed(&self) {
        self.items_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_published(&self) {
        self.retries_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_analyzed: self.items_analyzed.load(Ordering::Relaxed),
            items_split: self.items_split.load(Ordering::Relaxed),
            parts_converted: self.parts_converted.load(Ordering::Relaxed),
            parts_failed: self.parts_failed.load(Ordering::Relaxed),
            merges_triggered: self.merges_triggered.load(Ordering::Relaxed),
            items_completed: self.items_completed.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            retries_published: self.retries_published.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = PipelineMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_completed, 0);
    }

    #[test]
    fn recording_increments_the_right_counter_only() {
        let metrics = PipelineMetrics::new();
        metrics.record_item_completed();
        metrics.record_part_failed();
        metrics.record_part_failed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_completed, 1);
        assert_eq!(snapshot.parts_failed, 2);
        assert_eq!(snapshot.items_analyzed, 0);
    }
}
