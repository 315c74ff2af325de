// Mofo Agent - Sensor sources
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated sensor drivers for hosts without hardware.
//!
//! Both drivers are seeded random walks so a run can be reproduced. The
//! humidity driver fails a configurable fraction of reads, the way a real
//! single-wire sensor occasionally misses its timing window.

use mofo::{AdcConfig, GasChannel, HumiditySensor, RawHumidityReading, SensorError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HUMIDITY_X10_MAX: i16 = 1000;

/// Random-walk humidity/temperature sensor
#[derive(Debug)]
pub struct SimulatedHumidity {
    rng: StdRng,
    humidity_x10: i16,
    temperature_x10: i16,
    failure_rate: f64,
}

impl SimulatedHumidity {
    /// Start near `humidity_percent`, failing `failure_rate` (0.0-1.0) of reads.
    ///
    /// The start is clamped to 0-100 %. A non-finite rate never fails.
    pub fn new(seed: u64, humidity_percent: f32, failure_rate: f64) -> Self {
        let start = if humidity_percent.is_finite() {
            (humidity_percent.clamp(0.0, 100.0) * 10.0).round() as i16
        } else {
            HUMIDITY_X10_MAX / 2
        };
        let failure_rate = if failure_rate.is_finite() {
            failure_rate.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            rng: StdRng::seed_from_u64(seed),
            humidity_x10: start,
            temperature_x10: 220,
            failure_rate,
        }
    }
}

impl HumiditySensor for SimulatedHumidity {
    fn read(&mut self) -> Result<RawHumidityReading, SensorError> {
        if self.rng.gen_bool(self.failure_rate) {
            return Err(SensorError::read_failed("humidity", "no response from sensor"));
        }

        self.humidity_x10 = self
            .humidity_x10
            .saturating_add(self.rng.gen_range(-15..=15))
            .clamp(0, HUMIDITY_X10_MAX);
        self.temperature_x10 = self
            .temperature_x10
            .saturating_add(self.rng.gen_range(-3..=3))
            .clamp(-400, 800);

        Ok(RawHumidityReading {
            humidity_x10: self.humidity_x10,
            temperature_x10: self.temperature_x10,
        })
    }
}

/// Random-walk analog gas channel
#[derive(Debug)]
pub struct SimulatedGas {
    rng: StdRng,
    raw: u16,
    config: Option<AdcConfig>,
}

impl SimulatedGas {
    pub fn new(seed: u64, raw: u16) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            raw,
            config: None,
        }
    }
}

impl GasChannel for SimulatedGas {
    fn configure(&mut self, config: AdcConfig) -> Result<(), SensorError> {
        self.config = Some(config);
        self.raw = self.raw.min(config.resolution.max_value());
        Ok(())
    }

    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let config = self.config.ok_or(SensorError::NotConfigured)?;
        let max = i32::from(config.resolution.max_value());
        let next = (i32::from(self.raw) + self.rng.gen_range(-25..=25)).clamp(0, max);
        self.raw = next as u16;
        Ok(self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mofo::{SampleSource, SensorReader};

    #[test]
    fn test_simulated_reader_stays_in_range() {
        let mut reader = SensorReader::new(
            SimulatedHumidity::new(1, 60.0, 0.0),
            SimulatedGas::new(2, 350),
            AdcConfig::default(),
        )
        .unwrap();

        for _ in 0..1000 {
            let sample = reader.read_sample().unwrap();
            assert!((0.0..=100.0).contains(&sample.humidity_percent));
            assert!(sample.gas_raw <= 4095);
        }
    }

    #[test]
    fn test_simulated_humidity_failures() {
        let mut sensor = SimulatedHumidity::new(3, 60.0, 1.0);
        assert!(matches!(
            sensor.read(),
            Err(SensorError::ReadFailed { sensor: "humidity", .. })
        ));
    }

    #[test]
    fn test_start_clamped_to_physical_range() {
        for start in [5000.0, -300.0, f32::NAN, f32::INFINITY] {
            let mut sensor = SimulatedHumidity::new(5, start, 0.0);
            for _ in 0..100 {
                let reading = sensor.read().unwrap();
                assert!((0..=1000).contains(&reading.humidity_x10));
            }
        }
    }

    #[test]
    fn test_non_finite_failure_rate_never_fails() {
        let mut sensor = SimulatedHumidity::new(6, 50.0, f64::NAN);
        for _ in 0..100 {
            assert!(sensor.read().is_ok());
        }
    }

    #[test]
    fn test_gas_requires_configure() {
        let mut gas = SimulatedGas::new(4, 100);
        assert_eq!(gas.read_raw(), Err(SensorError::NotConfigured));
    }

    #[test]
    fn test_same_seed_same_walk() {
        let mut a = SimulatedHumidity::new(9, 55.0, 0.1);
        let mut b = SimulatedHumidity::new(9, 55.0, 0.1);
        for _ in 0..50 {
            assert_eq!(a.read(), b.read());
        }
    }
}
