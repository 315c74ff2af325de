// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Debounced alert evaluation
//!
//! A sample qualifies when humidity is at or above the humidity threshold
//! and the gas reading is strictly above the gas threshold. The alert is
//! raised only after [`CONSECUTIVE_READINGS_THRESHOLD`] qualifying samples in
//! a row, while a single non-qualifying sample clears it at once. The
//! counter saturates and never goes past the threshold.

use crate::protocol::{ALERT_MESSAGE, SAFE_MESSAGE};
use crate::sensor::SensorSample;
use crate::thresholds::ThresholdConfig;
use std::fmt;

/// Qualifying samples in a row needed to raise the alert
pub const CONSECUTIVE_READINGS_THRESHOLD: u8 = 3;

/// Classification published every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlertStatus {
    #[default]
    Safe,
    Alert,
}

impl AlertStatus {
    /// Literal text sent on the status topic
    pub fn message(&self) -> &'static str {
        match self {
            AlertStatus::Safe => SAFE_MESSAGE,
            AlertStatus::Alert => ALERT_MESSAGE,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, AlertStatus::Alert)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Safe => write!(f, "SAFE"),
            AlertStatus::Alert => write!(f, "ALERT"),
        }
    }
}

/// Edge produced by one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Safe to Alert
    Raised,
    /// Alert to Safe
    Cleared,
    Unchanged,
}

/// Whether a sample contributes to the risk count
pub fn qualifies(sample: &SensorSample, thresholds: &ThresholdConfig) -> bool {
    sample.humidity_percent >= thresholds.humidity_threshold
        && i32::from(sample.gas_raw) > thresholds.gas_threshold
}

/// Pure transition rule: `(sample, thresholds, prior count) -> (count, status)`
pub fn evaluate(
    sample: &SensorSample,
    thresholds: &ThresholdConfig,
    prior_count: u8,
) -> (u8, AlertStatus) {
    let count = if qualifies(sample, thresholds) {
        prior_count
            .saturating_add(1)
            .min(CONSECUTIVE_READINGS_THRESHOLD)
    } else {
        0
    };

    let status = if count >= CONSECUTIVE_READINGS_THRESHOLD {
        AlertStatus::Alert
    } else {
        AlertStatus::Safe
    };

    (count, status)
}

/// Debounce state owned by the sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertState {
    consecutive_count: u8,
    status: AlertStatus,
}

impl AlertState {
    /// Start at count 0, Safe
    pub fn new() -> Self {
        Self::default()
    }

    /// Qualifying samples seen in a row, in `0..=3`
    pub fn consecutive_count(&self) -> u8 {
        self.consecutive_count
    }

    pub fn status(&self) -> AlertStatus {
        self.status
    }

    /// Apply one sample and report the status edge, if any
    pub fn observe(&mut self, sample: &SensorSample, thresholds: &ThresholdConfig) -> Transition {
        let previous = self.status;
        let (count, status) = evaluate(sample, thresholds, self.consecutive_count);
        self.consecutive_count = count;
        self.status = status;

        match (previous, status) {
            (AlertStatus::Safe, AlertStatus::Alert) => Transition::Raised,
            (AlertStatus::Alert, AlertStatus::Safe) => Transition::Cleared,
            _ => Transition::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(samples: &[(f32, u16)], thresholds: ThresholdConfig) -> Vec<(u8, AlertStatus)> {
        let mut state = AlertState::new();
        samples
            .iter()
            .map(|&(h, g)| {
                state.observe(&SensorSample::new(h, g), &thresholds);
                (state.consecutive_count(), state.status())
            })
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let state = AlertState::new();
        assert_eq!(state.consecutive_count(), 0);
        assert_eq!(state.status(), AlertStatus::Safe);
    }

    #[test]
    fn test_raises_on_third_qualifying_sample() {
        let out = run(
            &[(61.0, 400), (62.0, 360), (63.0, 370)],
            ThresholdConfig::default(),
        );
        assert_eq!(
            out,
            vec![
                (1, AlertStatus::Safe),
                (2, AlertStatus::Safe),
                (3, AlertStatus::Alert)
            ]
        );
    }

    #[test]
    fn test_single_clean_sample_resets() {
        let out = run(
            &[(61.0, 400), (62.0, 360), (59.0, 500)],
            ThresholdConfig::default(),
        );
        assert_eq!(out[2], (0, AlertStatus::Safe));
    }

    #[test]
    fn test_counter_saturates() {
        let samples = [(80.0, 900); 10];
        let out = run(&samples, ThresholdConfig::default());
        assert!(out.iter().all(|&(count, _)| count <= 3));
        assert_eq!(out.last(), Some(&(3, AlertStatus::Alert)));
    }

    #[test]
    fn test_boundaries() {
        let t = ThresholdConfig::default();
        // humidity inclusive
        assert!(qualifies(&SensorSample::new(60.0, 351), &t));
        // gas exclusive
        assert!(!qualifies(&SensorSample::new(60.0, 350), &t));
        assert!(!qualifies(&SensorSample::new(59.9, 4095), &t));
    }

    #[test]
    fn test_evaluate_from_saturated_prior() {
        let t = ThresholdConfig::default();
        let (count, status) = evaluate(&SensorSample::new(70.0, 500), &t, 3);
        assert_eq!((count, status), (3, AlertStatus::Alert));

        let (count, status) = evaluate(&SensorSample::new(10.0, 500), &t, 3);
        assert_eq!((count, status), (0, AlertStatus::Safe));
    }

    #[test]
    fn test_transitions() {
        let t = ThresholdConfig::default();
        let hot = SensorSample::new(75.0, 800);
        let mut state = AlertState::new();

        assert_eq!(state.observe(&hot, &t), Transition::Unchanged);
        assert_eq!(state.observe(&hot, &t), Transition::Unchanged);
        assert_eq!(state.observe(&hot, &t), Transition::Raised);
        assert_eq!(state.observe(&hot, &t), Transition::Unchanged);
        assert_eq!(
            state.observe(&SensorSample::new(40.0, 800), &t),
            Transition::Cleared
        );
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(AlertStatus::Alert.message(), "Alerta de Mofo!");
        assert_eq!(AlertStatus::Safe.message(), "Ambiente seguro!");
        assert_eq!(AlertStatus::Alert.to_string(), "ALERT");
    }

    #[test]
    fn test_negative_gas_threshold_always_exceeded() {
        let t = ThresholdConfig::new(0.0, -1);
        assert!(qualifies(&SensorSample::new(0.0, 0), &t));
    }
}
