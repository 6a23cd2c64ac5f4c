//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path counters to avoid mutex contention. All
//! updates use Relaxed ordering intentionally - these are statistical
//! counters only, never used for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Lock-free metrics collector
///
/// Recording is lock-free; `report()` atomically swaps the per-interval
/// counters to get a consistent snapshot.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Fragments accepted off the wire (monotonic)
    fragments_received: AtomicU64,
    /// Fragments dropped: parse error, missing id, full channel (monotonic)
    fragments_dropped: AtomicU64,
    /// Forwards acknowledged with 2xx (monotonic)
    forwards_ok: AtomicU64,
    /// Forwards refused by the upstream (monotonic)
    forwards_rejected: AtomicU64,
    /// Forwards that never reached the upstream (monotonic)
    forwards_failed: AtomicU64,
    /// Sum of forward latencies in milliseconds (reset on report)
    forward_latency_sum_ms: AtomicU64,
    /// Forward attempts since last report (reset on report)
    forwards_since_report: AtomicU64,
    /// Max forward latency in milliseconds (reset on report)
    forward_latency_max_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fragment_received(&self) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fragment_dropped(&self) {
        self.fragments_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_ok(&self, latency_ms: u64) {
        self.forwards_ok.fetch_add(1, Ordering::Relaxed);
        self.record_forward_latency(latency_ms);
    }

    pub fn record_forward_rejected(&self, latency_ms: u64) {
        self.forwards_rejected.fetch_add(1, Ordering::Relaxed);
        self.record_forward_latency(latency_ms);
    }

    pub fn record_forward_failed(&self, latency_ms: u64) {
        self.forwards_failed.fetch_add(1, Ordering::Relaxed);
        self.record_forward_latency(latency_ms);
    }

    fn record_forward_latency(&self, latency_ms: u64) {
        self.forward_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.forwards_since_report.fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.forward_latency_max_ms, latency_ms);
    }

    /// Snapshot the counters, resetting the per-interval ones
    pub fn report(&self, tracked_spaces: usize) -> MetricsSummary {
        let forwards = self.forwards_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.forward_latency_sum_ms.swap(0, Ordering::Relaxed);
        let latency_max = self.forward_latency_max_ms.swap(0, Ordering::Relaxed);

        MetricsSummary {
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            fragments_dropped: self.fragments_dropped.load(Ordering::Relaxed),
            forwards_ok: self.forwards_ok.load(Ordering::Relaxed),
            forwards_rejected: self.forwards_rejected.load(Ordering::Relaxed),
            forwards_failed: self.forwards_failed.load(Ordering::Relaxed),
            avg_forward_latency_ms: if forwards > 0 { latency_sum / forwards } else { 0 },
            max_forward_latency_ms: latency_max,
            tracked_spaces,
        }
    }
}

/// Point-in-time metrics snapshot for logging
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub fragments_received: u64,
    pub fragments_dropped: u64,
    pub forwards_ok: u64,
    pub forwards_rejected: u64,
    pub forwards_failed: u64,
    pub avg_forward_latency_ms: u64,
    pub max_forward_latency_ms: u64,
    pub tracked_spaces: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            fragments_received = %self.fragments_received,
            fragments_dropped = %self.fragments_dropped,
            forwards_ok = %self.forwards_ok,
            forwards_rejected = %self.forwards_rejected,
            forwards_failed = %self.forwards_failed,
            avg_forward_latency_ms = %self.avg_forward_latency_ms,
            max_forward_latency_ms = %self.max_forward_latency_ms,
            tracked_spaces = %self.tracked_spaces,
            "metrics_summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.record_fragment_received();
        metrics.record_fragment_received();
        metrics.record_fragment_dropped();
        metrics.record_forward_ok(10);
        metrics.record_forward_rejected(20);
        metrics.record_forward_failed(30);

        let summary = metrics.report(2);
        assert_eq!(summary.fragments_received, 2);
        assert_eq!(summary.fragments_dropped, 1);
        assert_eq!(summary.forwards_ok, 1);
        assert_eq!(summary.forwards_rejected, 1);
        assert_eq!(summary.forwards_failed, 1);
        assert_eq!(summary.avg_forward_latency_ms, 20);
        assert_eq!(summary.max_forward_latency_ms, 30);
        assert_eq!(summary.tracked_spaces, 2);
    }

    #[test]
    fn test_report_resets_interval_counters() {
        let metrics = Metrics::new();
        metrics.record_forward_ok(40);
        let first = metrics.report(0);
        assert_eq!(first.max_forward_latency_ms, 40);

        let second = metrics.report(0);
        assert_eq!(second.avg_forward_latency_ms, 0);
        assert_eq!(second.max_forward_latency_ms, 0);
        // Monotonic totals survive the reset
        assert_eq!(second.forwards_ok, 1);
    }
}
