// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for Mofo
//!
//! This module defines all error types used throughout the library.
//! None of them is fatal inside the sampling loop: sensor errors skip a
//! cycle, parse errors keep the previous threshold, channel errors drop a
//! single publish.

use thiserror::Error;

/// Result type alias for Mofo operations
pub type Result<T> = std::result::Result<T, MofoError>;

/// Main error type for Mofo operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MofoError {
    /// Sensor error
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Threshold update rejected
    #[error("Threshold update rejected: {0}")]
    Threshold(#[from] ThresholdParseError),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while reading a sensor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The read did not complete (bus fault, timing fault, checksum)
    #[error("{sensor} read failed: {reason}")]
    ReadFailed { sensor: &'static str, reason: String },

    /// Raw value outside the range allowed by the converter resolution
    #[error("Raw value {value} exceeds converter maximum {max}")]
    OutOfRange { value: u32, max: u32 },

    /// Analog channel used before `configure`
    #[error("Analog channel not configured")]
    NotConfigured,

    /// Recorded source has no more samples
    #[error("Sample source exhausted")]
    Exhausted,
}

impl SensorError {
    /// Shorthand for a failed read
    pub fn read_failed(sensor: &'static str, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            sensor,
            reason: reason.into(),
        }
    }
}

/// Errors while parsing an inbound threshold payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdParseError {
    /// Payload bytes are not UTF-8
    #[error("Payload on {topic} is not valid UTF-8")]
    InvalidUtf8 { topic: String },

    /// Payload is empty or whitespace only
    #[error("Empty payload on {topic}")]
    Empty { topic: String },

    /// Payload is not a number of the expected kind
    #[error("Invalid number on {topic}: {payload:?}")]
    InvalidNumber { topic: String, payload: String },

    /// Payload parsed to NaN or infinity
    #[error("Non-finite value on {topic}: {payload:?}")]
    NonFinite { topic: String, payload: String },
}

/// Errors related to the messaging channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// Broker connection lost
    #[error("Disconnected: {reason}")]
    Disconnected { reason: String },

    /// Outgoing request queue full
    #[error("Send buffer full")]
    BufferFull,

    /// Channel closed for good
    #[error("Channel closed")]
    Closed,
}

/// Errors in the monitor configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Sampling period must be non-zero
    #[error("Sampling period must be greater than zero")]
    ZeroPeriod,

    /// A topic name is empty
    #[error("Topic {0} is empty")]
    EmptyTopic(&'static str),

    /// Two roles share one topic
    #[error("Topic {topic:?} used more than once")]
    DuplicateTopic { topic: String },

    /// File could not be read
    #[error("Cannot read {path}: {reason}")]
    Io { path: String, reason: String },

    /// TOML could not be parsed
    #[error("Invalid TOML: {0}")]
    Parse(String),
}
