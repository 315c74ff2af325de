// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor configuration.
//!
//! Every field has a default matching the deployed firmware, so an empty
//! TOML document is a valid configuration:
//!
//! ```toml
//! period_ms = 10000
//! publish_qos = "at_least_once"
//! subscribe_qos = "at_most_once"
//!
//! [thresholds]
//! humidity_threshold = 60.0
//! gas_threshold = 350
//!
//! [topics]
//! humidity = "sensor_mofo/umidadeatual"
//!
//! [adc]
//! resolution = "bits12"
//! attenuation = "db11"
//! ```

use crate::error::ConfigError;
use crate::protocol::{
    QoS, TOPIC_GAS, TOPIC_GAS_THRESHOLD, TOPIC_HUMIDITY, TOPIC_HUMIDITY_THRESHOLD, TOPIC_STATUS,
};
use crate::sensor::AdcConfig;
use crate::thresholds::ThresholdConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default sampling period (10 seconds)
pub const DEFAULT_PERIOD_MS: u64 = 10_000;

/// Topic names, one per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Published humidity reading
    pub humidity: String,
    /// Published gas reading
    pub gas: String,
    /// Published alert status
    pub status: String,
    /// Subscribed humidity threshold
    pub humidity_threshold: String,
    /// Subscribed gas threshold
    pub gas_threshold: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            humidity: TOPIC_HUMIDITY.to_string(),
            gas: TOPIC_GAS.to_string(),
            status: TOPIC_STATUS.to_string(),
            humidity_threshold: TOPIC_HUMIDITY_THRESHOLD.to_string(),
            gas_threshold: TOPIC_GAS_THRESHOLD.to_string(),
        }
    }
}

impl TopicConfig {
    /// Topics the monitor subscribes to
    pub fn subscriptions(&self) -> [&str; 2] {
        [self.humidity_threshold.as_str(), self.gas_threshold.as_str()]
    }

    fn named(&self) -> [(&'static str, &str); 5] {
        [
            ("humidity", self.humidity.as_str()),
            ("gas", self.gas.as_str()),
            ("status", self.status.as_str()),
            ("humidity_threshold", self.humidity_threshold.as_str()),
            ("gas_threshold", self.gas_threshold.as_str()),
        ]
    }
}

/// Master configuration for the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between the end of one cycle and the start of the next (ms)
    pub period_ms: u64,

    /// QoS for the three readings
    pub publish_qos: QoS,

    /// QoS for the threshold subscriptions
    pub subscribe_qos: QoS,

    /// Initial thresholds; reset to these on every restart
    pub thresholds: ThresholdConfig,

    /// Topic names
    pub topics: TopicConfig,

    /// Gas channel setup
    pub adc: AdcConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            publish_qos: QoS::AtLeastOnce,
            subscribe_qos: QoS::AtMostOnce,
            thresholds: ThresholdConfig::default(),
            topics: TopicConfig::default(),
            adc: AdcConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Default configuration with a different period
    pub fn with_period(period: Duration) -> Self {
        Self {
            period_ms: period.as_millis() as u64,
            ..Default::default()
        }
    }

    /// Sampling period
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// Check the configuration before the loop starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        let named = self.topics.named();
        for (i, (role, topic)) in named.iter().enumerate() {
            if topic.trim().is_empty() {
                return Err(ConfigError::EmptyTopic(*role));
            }
            if named[i + 1..].iter().any(|(_, other)| other == topic) {
                return Err(ConfigError::DuplicateTopic {
                    topic: topic.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{Attenuation, Resolution};
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.period(), Duration::from_secs(10));
        assert_eq!(config.thresholds, ThresholdConfig::new(60.0, 350));
        assert_eq!(config.publish_qos, QoS::AtLeastOnce);
        assert_eq!(config.topics.status, "sensor_mofo/alertasituacao");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = MonitorConfig::from_toml_str("").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = MonitorConfig::from_toml_str(
            r#"
            period_ms = 2500

            [thresholds]
            gas_threshold = 500

            [adc]
            resolution = "bits10"
            "#,
        )
        .unwrap();

        assert_eq!(config.period_ms, 2500);
        assert_eq!(config.thresholds.humidity_threshold, 60.0);
        assert_eq!(config.thresholds.gas_threshold, 500);
        assert_eq!(config.adc.resolution, Resolution::Bits10);
        assert_eq!(config.adc.attenuation, Attenuation::Db11);
    }

    #[test]
    fn test_zero_period_rejected() {
        let result = MonitorConfig::from_toml_str("period_ms = 0");
        assert_eq!(result, Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn test_duplicate_topic_rejected() {
        let mut config = MonitorConfig::default();
        config.topics.gas = config.topics.humidity.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateTopic { .. })
        ));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let mut config = MonitorConfig::default();
        config.topics.gas_threshold = "  ".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyTopic("gas_threshold"))
        );
    }

    #[test]
    fn test_invalid_toml() {
        let result = MonitorConfig::from_toml_str("period_ms = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_file_and_roundtrip() {
        let mut config = MonitorConfig::with_period(Duration::from_secs(3));
        config.thresholds.humidity_threshold = 72.5;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = MonitorConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let result = MonitorConfig::load(Path::new("/nonexistent/mofo.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
