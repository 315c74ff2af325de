// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sampling loop
//!
//! [`Monitor`] runs one read → snapshot → evaluate → publish cycle.
//! [`Scheduler`] repeats it on a fixed period from a single task, so two
//! cycles never overlap. The period is a plain sleep after each cycle; the
//! time spent in the cycle itself is not compensated.
//!
//! A failed sensor read skips the cycle entirely: nothing is published and
//! the debounce counter keeps its value until the next good sample.

use crate::alert::{AlertState, Transition};
use crate::channel::Transport;
use crate::error::SensorError;
use crate::metrics::MonitorMetrics;
use crate::publisher::{PublishReport, Publisher};
use crate::sensor::{SampleSource, SensorSample};
use crate::thresholds::{ThresholdConfig, ThresholdStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Sample read, evaluated and published
    Published {
        sample: SensorSample,
        thresholds: ThresholdConfig,
        state: AlertState,
        report: PublishReport,
    },
    /// Sensor read failed; nothing published
    Skipped { error: SensorError },
}

impl CycleOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, CycleOutcome::Published { .. })
    }

    /// Alert state after the cycle, if it ran
    pub fn state(&self) -> Option<AlertState> {
        match self {
            CycleOutcome::Published { state, .. } => Some(*state),
            CycleOutcome::Skipped { .. } => None,
        }
    }
}

/// Owns everything one cycle needs
#[derive(Debug)]
pub struct Monitor<S, T> {
    source: S,
    publisher: Publisher<T>,
    store: Arc<ThresholdStore>,
    state: AlertState,
    metrics: Arc<MonitorMetrics>,
}

impl<S: SampleSource, T: Transport> Monitor<S, T> {
    /// Create a monitor reading thresholds from `store`
    pub fn new(source: S, publisher: Publisher<T>, store: Arc<ThresholdStore>) -> Self {
        Self {
            source,
            publisher,
            store,
            state: AlertState::new(),
            metrics: Arc::new(MonitorMetrics::new()),
        }
    }

    /// Record into shared counters
    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run one cycle
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let sample = match self.source.read_sample() {
            Ok(sample) => sample,
            Err(error) => {
                warn!(error = %error, "sensor read failed, skipping cycle");
                self.metrics.record_skipped();
                return CycleOutcome::Skipped { error };
            }
        };

        let thresholds = self.store.snapshot();
        match self.state.observe(&sample, &thresholds) {
            Transition::Raised => {
                info!(
                    humidity = sample.humidity_percent,
                    gas = sample.gas_raw,
                    "mold alert raised"
                );
                self.metrics.record_alert_raised();
            }
            Transition::Cleared => info!("mold alert cleared"),
            Transition::Unchanged => {}
        }

        if self.state.consecutive_count() > 0 {
            debug!(
                count = self.state.consecutive_count(),
                "alert condition detected"
            );
        }

        let report = self.publisher.publish_cycle(&sample, self.state.status());
        self.metrics
            .record_publish_failures(u64::from(report.failed()));
        self.metrics.record_published();

        info!(
            humidity = sample.humidity_percent,
            gas = sample.gas_raw,
            status = %self.state.status(),
            failed = report.failed(),
            "readings published"
        );

        CycleOutcome::Published {
            sample,
            thresholds,
            state: self.state,
            report,
        }
    }

    /// Current debounce state
    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn store(&self) -> &Arc<ThresholdStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    pub fn publisher(&self) -> &Publisher<T> {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut Publisher<T> {
        &mut self.publisher
    }
}

/// Fixed-period driver for a [`Monitor`]
#[derive(Debug)]
pub struct Scheduler<S, T> {
    monitor: Monitor<S, T>,
    period: Duration,
}

impl<S: SampleSource, T: Transport> Scheduler<S, T> {
    pub fn new(monitor: Monitor<S, T>, period: Duration) -> Self {
        Self { monitor, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn monitor(&self) -> &Monitor<S, T> {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut Monitor<S, T> {
        &mut self.monitor
    }

    /// Run forever: cycle, then sleep one period
    pub async fn run(&mut self) {
        self.run_with(|_| {}).await
    }

    /// Run forever, handing every outcome to `on_cycle` before sleeping
    pub async fn run_with<F>(&mut self, mut on_cycle: F)
    where
        F: FnMut(&CycleOutcome),
    {
        info!(period_ms = self.period.as_millis() as u64, "sampling loop started");
        loop {
            let outcome = self.monitor.run_cycle();
            on_cycle(&outcome);
            tokio::time::sleep(self.period).await;
        }
    }

    /// Run `cycles` cycles, sleeping between them but not after the last
    pub async fn run_for(&mut self, cycles: usize) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(cycles);
        for i in 0..cycles {
            if i > 0 {
                tokio::time::sleep(self.period).await;
            }
            outcomes.push(self.monitor.run_cycle());
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertStatus;
    use crate::channel::MemoryTransport;
    use crate::sensor::ScriptedSource;

    fn monitor(pairs: &[(f32, u16)]) -> Monitor<ScriptedSource, MemoryTransport> {
        Monitor::new(
            ScriptedSource::from_pairs(pairs),
            Publisher::new(MemoryTransport::new()),
            Arc::new(ThresholdStore::new()),
        )
    }

    #[test]
    fn test_cycle_publishes_three_messages() {
        let mut m = monitor(&[(61.0, 400)]);
        let outcome = m.run_cycle();

        assert!(outcome.is_published());
        assert_eq!(m.publisher().transport().pending_outgoing(), 3);
        assert_eq!(m.state().consecutive_count(), 1);
    }

    #[test]
    fn test_skipped_cycle_keeps_state_and_publishes_nothing() {
        let mut source = ScriptedSource::from_pairs(&[(61.0, 400), (62.0, 360)]);
        source.push_failure(SensorError::read_failed("humidity", "timeout"));
        source.push(SensorSample::new(63.0, 370));

        let mut m = Monitor::new(
            source,
            Publisher::new(MemoryTransport::new()),
            Arc::new(ThresholdStore::new()),
        );

        m.run_cycle();
        m.run_cycle();
        let skipped = m.run_cycle();
        assert!(matches!(skipped, CycleOutcome::Skipped { .. }));
        assert_eq!(m.state().consecutive_count(), 2);
        assert_eq!(m.publisher().transport().pending_outgoing(), 6);

        let outcome = m.run_cycle();
        assert_eq!(outcome.state().map(|s| s.status()), Some(AlertStatus::Alert));

        let snap = m.metrics().snapshot();
        assert_eq!(snap.cycles_published, 3);
        assert_eq!(snap.cycles_skipped, 1);
        assert_eq!(snap.alerts_raised, 1);
    }

    #[test]
    fn test_publish_failures_counted() {
        let mut transport = MemoryTransport::new();
        transport.disconnect();
        let mut m = Monitor::new(
            ScriptedSource::from_pairs(&[(50.0, 100)]),
            Publisher::new(transport),
            Arc::new(ThresholdStore::new()),
        );

        let outcome = m.run_cycle();
        assert!(outcome.is_published());
        assert_eq!(m.metrics().snapshot().publish_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_for_sleeps_between_cycles() {
        let m = monitor(&[(61.0, 400), (62.0, 360), (63.0, 370)]);
        let mut scheduler = Scheduler::new(m, Duration::from_secs(10));

        let start = tokio::time::Instant::now();
        let outcomes = scheduler.run_for(3).await;

        assert_eq!(outcomes.len(), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
        assert_eq!(
            outcomes[2].state().map(|s| s.status()),
            Some(AlertStatus::Alert)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_ticking() {
        let m = monitor(&[(61.0, 400), (62.0, 360)]);
        let mut scheduler = Scheduler::new(m, Duration::from_secs(10));

        let _ = tokio::time::timeout(Duration::from_secs(25), scheduler.run()).await;

        // t=0, t=10 published; t=20 hit an exhausted script
        let snap = scheduler.monitor().metrics().snapshot();
        assert_eq!(snap.cycles_published, 2);
        assert_eq!(snap.cycles_skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_sees_every_outcome() {
        let m = monitor(&[(61.0, 400), (62.0, 360), (63.0, 370)]);
        let mut scheduler = Scheduler::new(m, Duration::from_secs(10));
        let mut statuses = Vec::new();

        let _ = tokio::time::timeout(
            Duration::from_secs(25),
            scheduler.run_with(|o| statuses.push(o.state().map(|s| s.status()))),
        )
        .await;

        assert_eq!(
            statuses,
            vec![
                Some(AlertStatus::Safe),
                Some(AlertStatus::Safe),
                Some(AlertStatus::Alert)
            ]
        );
    }
}
