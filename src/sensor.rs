// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Sensor access
//!
//! Drivers for the humidity sensor and the analog gas channel live outside
//! this crate; they plug in through [`HumiditySensor`] and [`GasChannel`].
//! [`SensorReader`] combines the two into one [`SampleSource`] that the
//! monitor polls once per cycle.

use crate::error::SensorError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One normalized reading, produced fresh every cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Relative humidity in percent
    pub humidity_percent: f32,
    /// Raw gas-proxy value, no physical unit
    pub gas_raw: u16,
    /// Temperature in tenths of a degree, when the driver reports one
    pub temperature_x10: Option<i16>,
}

impl SensorSample {
    /// Create a sample without temperature
    pub fn new(humidity_percent: f32, gas_raw: u16) -> Self {
        Self {
            humidity_percent,
            gas_raw,
            temperature_x10: None,
        }
    }
}

/// Raw humidity driver output, both fields fixed-point ×10
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHumidityReading {
    /// Relative humidity ×10
    pub humidity_x10: i16,
    /// Temperature ×10
    pub temperature_x10: i16,
}

impl RawHumidityReading {
    /// Humidity in percent
    pub fn humidity_percent(&self) -> f32 {
        f32::from(self.humidity_x10) / 10.0
    }
}

/// Analog converter width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Bits9,
    Bits10,
    Bits11,
    #[default]
    Bits12,
}

impl Resolution {
    /// Number of bits
    pub fn bits(&self) -> u8 {
        match self {
            Resolution::Bits9 => 9,
            Resolution::Bits10 => 10,
            Resolution::Bits11 => 11,
            Resolution::Bits12 => 12,
        }
    }

    /// Largest raw value the converter can return
    pub fn max_value(&self) -> u16 {
        (1u16 << self.bits()) - 1
    }
}

/// Analog input attenuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attenuation {
    Db0,
    Db2_5,
    Db6,
    /// Full 0-3.3 V range
    #[default]
    Db11,
}

/// Gas channel setup, applied once before the first cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcConfig {
    pub resolution: Resolution,
    pub attenuation: Attenuation,
}

/// Humidity/temperature sensor driver
pub trait HumiditySensor {
    /// Blocking read with bounded latency
    fn read(&mut self) -> Result<RawHumidityReading, SensorError>;
}

/// Analog channel driver for the gas proxy
pub trait GasChannel {
    /// Configure width and attenuation
    fn configure(&mut self, config: AdcConfig) -> Result<(), SensorError>;

    /// Blocking raw conversion
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Anything that can produce one [`SensorSample`] per cycle
pub trait SampleSource {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        (**self).read_sample()
    }
}

/// Humidity sensor plus gas channel
#[derive(Debug)]
pub struct SensorReader<H, G> {
    humidity: H,
    gas: G,
    adc: AdcConfig,
}

impl<H: HumiditySensor, G: GasChannel> SensorReader<H, G> {
    /// Configure the gas channel and wrap both drivers
    pub fn new(humidity: H, mut gas: G, adc: AdcConfig) -> Result<Self, SensorError> {
        gas.configure(adc)?;
        tracing::debug!(
            bits = adc.resolution.bits(),
            attenuation = ?adc.attenuation,
            "gas channel configured"
        );
        Ok(Self { humidity, gas, adc })
    }

    /// Read humidity in percent plus the raw temperature
    pub fn read_humidity(&mut self) -> Result<(f32, i16), SensorError> {
        let raw = self.humidity.read()?;
        Ok((raw.humidity_percent(), raw.temperature_x10))
    }

    /// Read the raw gas proxy, checked against the converter width
    pub fn read_gas_proxy(&mut self) -> Result<u16, SensorError> {
        let raw = self.gas.read_raw()?;
        let max = self.adc.resolution.max_value();
        if raw > max {
            return Err(SensorError::OutOfRange {
                value: u32::from(raw),
                max: u32::from(max),
            });
        }
        Ok(raw)
    }
}

impl<H: HumiditySensor, G: GasChannel> SampleSource for SensorReader<H, G> {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        let (humidity_percent, temperature_x10) = self.read_humidity()?;
        let gas_raw = self.read_gas_proxy()?;
        Ok(SensorSample {
            humidity_percent,
            gas_raw,
            temperature_x10: Some(temperature_x10),
        })
    }
}

/// A source that replays a fixed script of readings and failures
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<Result<SensorSample, SensorError>>,
}

impl ScriptedSource {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Script made of `(humidity, gas)` pairs
    pub fn from_pairs(pairs: &[(f32, u16)]) -> Self {
        let mut source = Self::new();
        for &(humidity, gas) in pairs {
            source.push(SensorSample::new(humidity, gas));
        }
        source
    }

    /// Append a successful reading
    pub fn push(&mut self, sample: SensorSample) {
        self.steps.push_back(Ok(sample));
    }

    /// Append a failing reading
    pub fn push_failure(&mut self, error: SensorError) {
        self.steps.push_back(Err(error));
    }

    /// Steps left
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl SampleSource for ScriptedSource {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        self.steps.pop_front().unwrap_or(Err(SensorError::Exhausted))
    }
}
