// Mofo Agent - Recorded reading replay
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV replay of recorded sensor readings.
//!
//! The file carries the raw driver values, one row per cycle:
//!
//! ```text
//! humidity_x10,gas_raw,temperature_x10
//! 612,400,221
//! ,380,
//! 598,512,219
//! ```
//!
//! `temperature_x10` is optional. An empty humidity cell replays a failed
//! humidity read, so the cycle is skipped exactly as it would be on hardware.

use mofo::{AdcConfig, SampleSource, SensorError, SensorSample};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const HUMIDITY_COLUMN: &str = "humidity_x10";
const GAS_COLUMN: &str = "gas_raw";
const TEMPERATURE_COLUMN: &str = "temperature_x10";

/// Replay progress, shared with the HTTP status endpoint.
#[derive(Debug, Default)]
pub struct ReplayState {
    /// Rows consumed in the current pass.
    pub position: AtomicUsize,
    /// Rows in the file.
    pub total_samples: AtomicUsize,
    /// Completed passes over the file.
    pub passes: AtomicUsize,
    /// Set once a non-looping replay has run out.
    pub exhausted: AtomicBool,
}

/// One recorded row.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ReplayRow {
    humidity_x10: Option<i16>,
    gas_raw: u16,
    temperature_x10: Option<i16>,
}

/// Sample source backed by a recorded CSV file.
#[derive(Debug)]
pub struct ReplaySource {
    rows: Vec<ReplayRow>,
    max_gas: u16,
    loop_replay: bool,
    state: Arc<ReplayState>,
}

impl ReplaySource {
    /// Load a replay file. Gas values are checked against the ADC range.
    pub fn from_csv(path: &Path, adc: AdcConfig, loop_replay: bool) -> Result<Self, ReplayError> {
        if !path.exists() {
            return Err(ReplayError::FileNotFound(path.display().to_string()));
        }

        let rows = Self::parse_csv(path)?;
        if rows.is_empty() {
            return Err(ReplayError::EmptyDataset);
        }

        let state = Arc::new(ReplayState::default());
        state.total_samples.store(rows.len(), Ordering::SeqCst);

        info!(
            path = %path.display(),
            samples = rows.len(),
            loop_replay,
            "replay file loaded"
        );

        Ok(Self {
            rows,
            max_gas: adc.resolution.max_value(),
            loop_replay,
            state,
        })
    }

    fn parse_csv(path: &Path) -> Result<Vec<ReplayRow>, ReplayError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let column = |name: &str| headers.iter().position(|h| h.trim() == name);
        let humidity_idx = column(HUMIDITY_COLUMN)
            .ok_or_else(|| ReplayError::InvalidFormat(format!("missing column '{HUMIDITY_COLUMN}'")))?;
        let gas_idx = column(GAS_COLUMN)
            .ok_or_else(|| ReplayError::InvalidFormat(format!("missing column '{GAS_COLUMN}'")))?;
        let temperature_idx = column(TEMPERATURE_COLUMN);

        let mut rows = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let cell = |idx: usize| record.get(idx).map(str::trim).filter(|s| !s.is_empty());
            let invalid = |what: &str| {
                ReplayError::InvalidFormat(format!("row {}: invalid {what}", line + 1))
            };

            let humidity_x10 = cell(humidity_idx)
                .map(|s| s.parse::<i16>().map_err(|_| invalid(HUMIDITY_COLUMN)))
                .transpose()?;
            let gas_raw = cell(gas_idx)
                .ok_or_else(|| invalid(GAS_COLUMN))?
                .parse::<u16>()
                .map_err(|_| invalid(GAS_COLUMN))?;
            let temperature_x10 = temperature_idx
                .and_then(cell)
                .map(|s| s.parse::<i16>().map_err(|_| invalid(TEMPERATURE_COLUMN)))
                .transpose()?;

            rows.push(ReplayRow {
                humidity_x10,
                gas_raw,
                temperature_x10,
            });
        }

        Ok(rows)
    }

    /// Shared progress handle.
    pub fn state(&self) -> Arc<ReplayState> {
        Arc::clone(&self.state)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn next_row(&mut self) -> Option<ReplayRow> {
        let mut position = self.state.position.load(Ordering::SeqCst);
        if position >= self.rows.len() {
            if !self.loop_replay {
                self.state.exhausted.store(true, Ordering::SeqCst);
                return None;
            }
            self.state.passes.fetch_add(1, Ordering::SeqCst);
            debug!("replay wrapped to the first row");
            position = 0;
        }
        self.state.position.store(position + 1, Ordering::SeqCst);
        self.rows.get(position).copied()
    }
}

impl SampleSource for ReplaySource {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        let row = self.next_row().ok_or(SensorError::Exhausted)?;

        let humidity_x10 = row
            .humidity_x10
            .ok_or_else(|| SensorError::read_failed("humidity", "no reading recorded"))?;
        if row.gas_raw > self.max_gas {
            return Err(SensorError::OutOfRange {
                value: u32::from(row.gas_raw),
                max: u32::from(self.max_gas),
            });
        }

        Ok(SensorSample {
            humidity_percent: f32::from(humidity_x10) / 10.0,
            gas_raw: row.gas_raw,
            temperature_x10: row.temperature_x10,
        })
    }
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Empty dataset")]
    EmptyDataset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn create_test_csv() -> NamedTempFile {
        write_csv(&[
            "humidity_x10,gas_raw,temperature_x10",
            "612,400,221",
            ",380,",
            "598,512,219",
        ])
    }

    #[test]
    fn test_replay_rows() {
        let file = create_test_csv();
        let mut source = ReplaySource::from_csv(file.path(), AdcConfig::default(), false).unwrap();
        assert_eq!(source.len(), 3);

        let first = source.read_sample().unwrap();
        assert_eq!(first.humidity_percent, 61.2);
        assert_eq!(first.gas_raw, 400);
        assert_eq!(first.temperature_x10, Some(221));

        assert!(matches!(
            source.read_sample(),
            Err(SensorError::ReadFailed { sensor: "humidity", .. })
        ));

        let third = source.read_sample().unwrap();
        assert_eq!(third.gas_raw, 512);

        assert_eq!(source.read_sample(), Err(SensorError::Exhausted));
        assert!(source.state().exhausted.load(Ordering::SeqCst));
    }

    #[test]
    fn test_replay_loops() {
        let file = write_csv(&["humidity_x10,gas_raw", "700,400", "650,360"]);
        let mut source = ReplaySource::from_csv(file.path(), AdcConfig::default(), true).unwrap();

        let gas: Vec<u16> = (0..5).map(|_| source.read_sample().unwrap().gas_raw).collect();
        assert_eq!(gas, vec![400, 360, 400, 360, 400]);
        assert_eq!(source.state().passes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_temperature_column_optional() {
        let file = write_csv(&["gas_raw,humidity_x10", "100,450"]);
        let mut source = ReplaySource::from_csv(file.path(), AdcConfig::default(), false).unwrap();
        let sample = source.read_sample().unwrap();
        assert_eq!(sample.humidity_percent, 45.0);
        assert_eq!(sample.temperature_x10, None);
    }

    #[test]
    fn test_gas_out_of_adc_range() {
        let file = write_csv(&["humidity_x10,gas_raw", "500,5000"]);
        let mut source = ReplaySource::from_csv(file.path(), AdcConfig::default(), false).unwrap();
        assert_eq!(
            source.read_sample(),
            Err(SensorError::OutOfRange {
                value: 5000,
                max: 4095
            })
        );
    }

    #[test]
    fn test_missing_column_rejected() {
        let file = write_csv(&["timestamp_ms,humidity_x10", "1000,500"]);
        let err = ReplaySource::from_csv(file.path(), AdcConfig::default(), false).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidFormat(_)));
    }

    #[test]
    fn test_bad_cell_rejected() {
        let file = write_csv(&["humidity_x10,gas_raw", "abc,100"]);
        let err = ReplaySource::from_csv(file.path(), AdcConfig::default(), false).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidFormat(_)));
    }

    #[test]
    fn test_empty_and_missing_files() {
        let file = write_csv(&["humidity_x10,gas_raw"]);
        assert!(matches!(
            ReplaySource::from_csv(file.path(), AdcConfig::default(), false),
            Err(ReplayError::EmptyDataset)
        ));
        assert!(matches!(
            ReplaySource::from_csv(Path::new("/nonexistent/replay.csv"), AdcConfig::default(), false),
            Err(ReplayError::FileNotFound(_))
        ));
    }
}
