// Mofo Agent - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the mold-risk monitor.
//!
//! Gauges mirror the latest cycle and the live thresholds; the counters are
//! copied from the core [`mofo::MetricsSnapshot`] so the library stays free
//! of any exporter dependency.

use lazy_static::lazy_static;
use mofo::{AlertStatus, CycleOutcome, MetricsSnapshot, ThresholdConfig};
use prometheus::{register_gauge, Encoder, Gauge, TextEncoder};

lazy_static! {
    // ============================================================
    // Latest readings
    // ============================================================

    /// Relative humidity from the last published cycle.
    pub static ref HUMIDITY_PERCENT: Gauge = register_gauge!(
        "mofo_humidity_percent",
        "Relative humidity of the last published cycle (%)"
    ).unwrap();

    /// Raw gas-proxy value from the last published cycle.
    pub static ref GAS_RAW: Gauge = register_gauge!(
        "mofo_gas_raw",
        "Raw gas-proxy ADC value of the last published cycle"
    ).unwrap();

    // ============================================================
    // Alert state
    // ============================================================

    pub static ref HUMIDITY_THRESHOLD: Gauge = register_gauge!(
        "mofo_humidity_threshold_percent",
        "Humidity threshold in force for the last cycle (%)"
    ).unwrap();

    pub static ref GAS_THRESHOLD: Gauge = register_gauge!(
        "mofo_gas_threshold",
        "Gas threshold in force for the last cycle"
    ).unwrap();

    /// Consecutive qualifying samples, saturating at 3.
    pub static ref CONSECUTIVE_COUNT: Gauge = register_gauge!(
        "mofo_consecutive_count",
        "Consecutive samples meeting the alert condition"
    ).unwrap();

    /// 1 = alert, 0 = safe.
    pub static ref ALERT_ACTIVE: Gauge = register_gauge!(
        "mofo_alert_active",
        "Mold alert status (1=alert, 0=safe)"
    ).unwrap();

    // ============================================================
    // Counters (mirrored from MonitorMetrics)
    // ============================================================

    pub static ref CYCLES_PUBLISHED_TOTAL: Gauge = register_gauge!(
        "mofo_cycles_published_total",
        "Cycles whose readings were handed to the broker client"
    ).unwrap();

    pub static ref CYCLES_SKIPPED_TOTAL: Gauge = register_gauge!(
        "mofo_cycles_skipped_total",
        "Cycles skipped because a sensor read failed"
    ).unwrap();

    pub static ref PUBLISH_FAILURES_TOTAL: Gauge = register_gauge!(
        "mofo_publish_failures_total",
        "Individual publishes the broker client refused"
    ).unwrap();

    pub static ref THRESHOLD_UPDATES_TOTAL: Gauge = register_gauge!(
        "mofo_threshold_updates_total",
        "Threshold updates applied"
    ).unwrap();

    pub static ref THRESHOLD_REJECTS_TOTAL: Gauge = register_gauge!(
        "mofo_threshold_rejects_total",
        "Threshold payloads rejected as malformed"
    ).unwrap();

    pub static ref ALERTS_RAISED_TOTAL: Gauge = register_gauge!(
        "mofo_alerts_raised_total",
        "Transitions from safe to alert"
    ).unwrap();

    // ============================================================
    // Broker
    // ============================================================

    /// 1 while the broker session is up.
    pub static ref BROKER_CONNECTED: Gauge = register_gauge!(
        "mofo_broker_connected",
        "MQTT broker connection state (1=connected, 0=disconnected)"
    ).unwrap();
}

fn alert_value(status: AlertStatus) -> f64 {
    if status.is_alert() {
        1.0
    } else {
        0.0
    }
}

/// Update gauges from a finished cycle. Skipped cycles leave them as-is.
pub fn update_cycle_metrics(outcome: &CycleOutcome) {
    if let CycleOutcome::Published {
        sample,
        thresholds,
        state,
        ..
    } = outcome
    {
        HUMIDITY_PERCENT.set(f64::from(sample.humidity_percent));
        GAS_RAW.set(f64::from(sample.gas_raw));
        update_threshold_metrics(thresholds);
        CONSECUTIVE_COUNT.set(f64::from(state.consecutive_count()));
        ALERT_ACTIVE.set(alert_value(state.status()));
    }
}

/// Update threshold gauges.
pub fn update_threshold_metrics(thresholds: &ThresholdConfig) {
    HUMIDITY_THRESHOLD.set(f64::from(thresholds.humidity_threshold));
    GAS_THRESHOLD.set(f64::from(thresholds.gas_threshold));
}

/// Copy the core counters.
pub fn update_counter_metrics(snapshot: &MetricsSnapshot) {
    CYCLES_PUBLISHED_TOTAL.set(snapshot.cycles_published as f64);
    CYCLES_SKIPPED_TOTAL.set(snapshot.cycles_skipped as f64);
    PUBLISH_FAILURES_TOTAL.set(snapshot.publish_failures as f64);
    THRESHOLD_UPDATES_TOTAL.set(snapshot.updates_applied as f64);
    THRESHOLD_REJECTS_TOTAL.set(snapshot.updates_rejected as f64);
    ALERTS_RAISED_TOTAL.set(snapshot.alerts_raised as f64);
}

pub fn set_broker_connected(connected: bool) {
    BROKER_CONNECTED.set(if connected { 1.0 } else { 0.0 });
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
