//! Runtime counters for the monitor
//!
//! The sampling loop and the inbound message task both record into one
//! shared [`MonitorMetrics`]; every counter is a relaxed atomic so
//! recording never blocks either side.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counters
#[derive(Debug, Default)]
pub struct MonitorMetrics {
    cycles_published: AtomicU64,
    cycles_skipped: AtomicU64,
    publish_failures: AtomicU64,
    updates_applied: AtomicU64,
    updates_rejected: AtomicU64,
    updates_ignored: AtomicU64,
    alerts_raised: AtomicU64,
}

/// Point-in-time copy of [`MonitorMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Cycles that read a sample and published it
    pub cycles_published: u64,
    /// Cycles dropped because a sensor read failed
    pub cycles_skipped: u64,
    /// Individual publishes refused by the transport
    pub publish_failures: u64,
    /// Threshold writes applied
    pub updates_applied: u64,
    /// Threshold payloads rejected
    pub updates_rejected: u64,
    /// Inbound messages on unrelated topics
    pub updates_ignored: u64,
    /// Safe to Alert edges
    pub alerts_raised: u64,
}

impl MonitorMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_published(&self) {
        self.cycles_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failures(&self, count: u64) {
        self.publish_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_update_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_ignored(&self) {
        self.updates_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_raised(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_published: self.cycles_published.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            updates_ignored: self.updates_ignored.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Total cycles attempted
    pub fn cycles_total(&self) -> u64 {
        self.cycles_published + self.cycles_skipped
    }

    /// Fraction of cycles skipped (0.0-1.0)
    pub fn skip_rate(&self) -> f64 {
        let total = self.cycles_total();
        if total == 0 {
            return 0.0;
        }
        self.cycles_skipped as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = MonitorMetrics::new();
        metrics.record_published();
        metrics.record_published();
        metrics.record_skipped();
        metrics.record_publish_failures(3);
        metrics.record_update_rejected();

        let snap = metrics.snapshot();
        assert_eq!(snap.cycles_published, 2);
        assert_eq!(snap.cycles_skipped, 1);
        assert_eq!(snap.publish_failures, 3);
        assert_eq!(snap.updates_rejected, 1);
        assert_eq!(snap.cycles_total(), 3);
    }

    #[test]
    fn test_skip_rate() {
        assert_eq!(MetricsSnapshot::default().skip_rate(), 0.0);

        let snap = MetricsSnapshot {
            cycles_published: 3,
            cycles_skipped: 1,
            ..Default::default()
        };
        assert!((snap.skip_rate() - 0.25).abs() < 1e-12);
    }
}
