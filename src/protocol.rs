// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Wire protocol for Mofo
//!
//! This module defines what crosses the broker boundary:
//! - Topic names (published readings and subscribed thresholds)
//! - Status strings matched literally by downstream consumers
//! - JSON payload shapes
//! - Quality of service levels

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Current humidity reading
pub const TOPIC_HUMIDITY: &str = "sensor_mofo/umidadeatual";
/// Current gas-proxy reading
pub const TOPIC_GAS: &str = "sensor_mofo/gasesatual";
/// Debounced alert status
pub const TOPIC_STATUS: &str = "sensor_mofo/alertasituacao";
/// Inbound humidity threshold
pub const TOPIC_HUMIDITY_THRESHOLD: &str = "sensor_mofo/limiar_umidade";
/// Inbound gas threshold
pub const TOPIC_GAS_THRESHOLD: &str = "sensor_mofo/limiar_gases";

/// Status text published while the alert is raised
pub const ALERT_MESSAGE: &str = "Alerta de Mofo!";
/// Status text published otherwise
pub const SAFE_MESSAGE: &str = "Ambiente seguro!";

/// MQTT quality of service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget
    AtMostOnce = 0,
    /// Acknowledged, possibly duplicated
    #[default]
    AtLeastOnce = 1,
    /// Four-way handshake
    ExactlyOnce = 2,
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QoS{}", *self as u8)
    }
}

/// Body of a humidity message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumidityPayload {
    /// Relative humidity in percent, one decimal
    pub umidade: f64,
}

/// Body of a gas message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPayload {
    /// Raw 12-bit converter value
    pub mq135_raw: u16,
}

/// Body of a status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// One of [`ALERT_MESSAGE`] or [`SAFE_MESSAGE`]
    pub status: String,
}

/// Round to one decimal place.
///
/// Widening happens before rounding so `61.3f32` renders as `61.3`, not
/// `61.29999923706055`.
pub fn one_decimal(value: f32) -> f64 {
    (f64::from(value) * 10.0).round() / 10.0
}

/// Encode `{"umidade":<one decimal>}`
pub fn humidity_payload(percent: f32) -> String {
    json!({ "umidade": one_decimal(percent) }).to_string()
}

/// Encode `{"mq135_raw":<integer>}`
pub fn gas_payload(raw: u16) -> String {
    json!({ "mq135_raw": raw }).to_string()
}

/// Encode `{"status":"<message>"}`
pub fn status_payload(message: &str) -> String {
    json!({ "status": message }).to_string()
}
