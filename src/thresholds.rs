// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Shared alert thresholds
//!
//! The sampling loop reads the thresholds once per cycle while the inbound
//! message task may rewrite them at any time. Each field lives in its own
//! atomic so neither side ever blocks and a half-written value can never be
//! observed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Default humidity threshold in percent
pub const DEFAULT_HUMIDITY_THRESHOLD: f32 = 60.0;

/// Default gas-proxy threshold (raw converter units)
pub const DEFAULT_GAS_THRESHOLD: i32 = 350;

/// A pair of alert thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Humidity at or above this value qualifies
    pub humidity_threshold: f32,
    /// Gas reading strictly above this value qualifies
    pub gas_threshold: i32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            humidity_threshold: DEFAULT_HUMIDITY_THRESHOLD,
            gas_threshold: DEFAULT_GAS_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    /// Create a threshold pair
    pub fn new(humidity_threshold: f32, gas_threshold: i32) -> Self {
        Self {
            humidity_threshold,
            gas_threshold,
        }
    }
}

/// Lock-free store for the live thresholds.
///
/// Values are not range checked: whatever the writer stores becomes
/// effective on the next [`snapshot`](Self::snapshot).
#[derive(Debug)]
pub struct ThresholdStore {
    /// `f32::to_bits` of the humidity threshold
    humidity_bits: AtomicU32,
    gas: AtomicI32,
}

impl ThresholdStore {
    /// Create a store holding the default thresholds
    pub fn new() -> Self {
        Self::with_config(ThresholdConfig::default())
    }

    /// Create a store seeded with the given thresholds
    pub fn with_config(config: ThresholdConfig) -> Self {
        Self {
            humidity_bits: AtomicU32::new(config.humidity_threshold.to_bits()),
            gas: AtomicI32::new(config.gas_threshold),
        }
    }

    /// Read both thresholds
    pub fn snapshot(&self) -> ThresholdConfig {
        ThresholdConfig {
            humidity_threshold: self.humidity_threshold(),
            gas_threshold: self.gas_threshold(),
        }
    }

    /// Current humidity threshold
    pub fn humidity_threshold(&self) -> f32 {
        f32::from_bits(self.humidity_bits.load(Ordering::Acquire))
    }

    /// Current gas threshold
    pub fn gas_threshold(&self) -> i32 {
        self.gas.load(Ordering::Acquire)
    }

    /// Replace the humidity threshold, returning the previous value
    pub fn set_humidity_threshold(&self, value: f32) -> f32 {
        f32::from_bits(self.humidity_bits.swap(value.to_bits(), Ordering::AcqRel))
    }

    /// Replace the gas threshold, returning the previous value
    pub fn set_gas_threshold(&self, value: i32) -> i32 {
        self.gas.swap(value, Ordering::AcqRel)
    }
}

impl Default for ThresholdStore {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ThresholdConfig> for ThresholdStore {
    fn from(config: ThresholdConfig) -> Self {
        Self::with_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_defaults() {
        let store = ThresholdStore::new();
        let snap = store.snapshot();
        assert_eq!(snap.humidity_threshold, 60.0);
        assert_eq!(snap.gas_threshold, 350);
    }

    #[test]
    fn test_set_returns_previous() {
        let store = ThresholdStore::new();
        assert_eq!(store.set_humidity_threshold(55.5), 60.0);
        assert_eq!(store.set_gas_threshold(420), 350);
        assert_eq!(store.snapshot(), ThresholdConfig::new(55.5, 420));
    }

    #[test]
    fn test_no_range_validation() {
        let store = ThresholdStore::new();
        store.set_humidity_threshold(-12.0);
        store.set_gas_threshold(i32::MAX);
        let snap = store.snapshot();
        assert_eq!(snap.humidity_threshold, -12.0);
        assert_eq!(snap.gas_threshold, i32::MAX);
    }

    #[test]
    fn test_with_config() {
        let store = ThresholdStore::with_config(ThresholdConfig::new(70.0, 500));
        assert_eq!(store.humidity_threshold(), 70.0);
        assert_eq!(store.gas_threshold(), 500);
    }

    #[test]
    fn test_concurrent_writes_never_tear() {
        let store = Arc::new(ThresholdStore::new());
        let allowed = [60.0f32, 12.25, 87.5];

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10_000 {
                    store.set_humidity_threshold(allowed[1 + i % 2]);
                }
            })
        };

        for _ in 0..10_000 {
            let value = store.humidity_threshold();
            assert!(allowed.contains(&value), "torn read: {}", value);
        }

        writer.join().unwrap();
    }
}
