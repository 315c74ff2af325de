// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Runtime threshold updates
//!
//! Operators retune the alert by publishing plain numeric text on the two
//! threshold topics. Payloads that do not parse are rejected and the
//! previous threshold stays in force; messages on any other topic are
//! ignored.

use crate::channel::{InboundMessage, Transport};
use crate::config::TopicConfig;
use crate::error::{ChannelError, ThresholdParseError};
use crate::metrics::MonitorMetrics;
use crate::protocol::QoS;
use crate::thresholds::ThresholdStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What an inbound message changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpdateOutcome {
    HumidityUpdated { previous: f32, current: f32 },
    GasUpdated { previous: i32, current: i32 },
    /// Topic is not a threshold topic
    Ignored,
}

/// Parse a humidity threshold: trimmed decimal text, finite
pub fn parse_humidity_threshold(topic: &str, payload: &[u8]) -> Result<f32, ThresholdParseError> {
    let text = payload_text(topic, payload)?;
    let value: f32 = text
        .parse()
        .map_err(|_| ThresholdParseError::InvalidNumber {
            topic: topic.to_string(),
            payload: text.to_string(),
        })?;

    if !value.is_finite() {
        return Err(ThresholdParseError::NonFinite {
            topic: topic.to_string(),
            payload: text.to_string(),
        });
    }
    Ok(value)
}

/// Parse a gas threshold: trimmed integer text
pub fn parse_gas_threshold(topic: &str, payload: &[u8]) -> Result<i32, ThresholdParseError> {
    let text = payload_text(topic, payload)?;
    text.parse()
        .map_err(|_| ThresholdParseError::InvalidNumber {
            topic: topic.to_string(),
            payload: text.to_string(),
        })
}

fn payload_text<'a>(topic: &str, payload: &'a [u8]) -> Result<&'a str, ThresholdParseError> {
    let text = std::str::from_utf8(payload).map_err(|_| ThresholdParseError::InvalidUtf8 {
        topic: topic.to_string(),
    })?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ThresholdParseError::Empty {
            topic: topic.to_string(),
        });
    }
    Ok(text)
}

/// Subscribe to both threshold topics
pub fn subscribe_thresholds<T: Transport + ?Sized>(
    transport: &mut T,
    topics: &TopicConfig,
    qos: QoS,
) -> Result<(), ChannelError> {
    for topic in topics.subscriptions() {
        transport.subscribe(topic, qos)?;
        debug!(topic, %qos, "subscribed");
    }
    Ok(())
}

/// Writes parsed threshold messages into the shared store
#[derive(Debug, Clone)]
pub struct ThresholdUpdateHandler {
    store: Arc<ThresholdStore>,
    topics: TopicConfig,
    metrics: Option<Arc<MonitorMetrics>>,
}

impl ThresholdUpdateHandler {
    /// Create a handler listening on the default topics
    pub fn new(store: Arc<ThresholdStore>) -> Self {
        Self::with_topics(store, TopicConfig::default())
    }

    /// Create a handler with explicit topics
    pub fn with_topics(store: Arc<ThresholdStore>, topics: TopicConfig) -> Self {
        Self {
            store,
            topics,
            metrics: None,
        }
    }

    /// Record outcomes into shared counters
    pub fn with_metrics(mut self, metrics: Arc<MonitorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply one inbound message.
    ///
    /// On error the store is left untouched.
    pub fn handle(
        &self,
        topic: &str,
        payload: &[u8],
    ) -> Result<UpdateOutcome, ThresholdParseError> {
        let result = if topic == self.topics.humidity_threshold {
            parse_humidity_threshold(topic, payload).map(|current| {
                let previous = self.store.set_humidity_threshold(current);
                info!(previous, current, "humidity threshold updated");
                UpdateOutcome::HumidityUpdated { previous, current }
            })
        } else if topic == self.topics.gas_threshold {
            parse_gas_threshold(topic, payload).map(|current| {
                let previous = self.store.set_gas_threshold(current);
                info!(previous, current, "gas threshold updated");
                UpdateOutcome::GasUpdated { previous, current }
            })
        } else {
            debug!(topic, "ignoring message on unrelated topic");
            Ok(UpdateOutcome::Ignored)
        };

        if let Err(ref e) = result {
            warn!(topic, error = %e, "threshold update rejected");
        }
        self.record(&result);
        result
    }

    /// Apply an [`InboundMessage`]
    pub fn handle_message(
        &self,
        message: &InboundMessage,
    ) -> Result<UpdateOutcome, ThresholdParseError> {
        self.handle(&message.topic, &message.payload)
    }

    /// Consume inbound messages until every sender is dropped
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = inbound.recv().await {
            // Failures are already logged and counted.
            let _ = self.handle_message(&message);
        }
        debug!("inbound channel closed");
    }

    /// Shared threshold store
    pub fn store(&self) -> &Arc<ThresholdStore> {
        &self.store
    }

    fn record(&self, result: &Result<UpdateOutcome, ThresholdParseError>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        match result {
            Ok(UpdateOutcome::Ignored) => metrics.record_update_ignored(),
            Ok(_) => metrics.record_update_applied(),
            Err(_) => metrics.record_update_rejected(),
        }
    }
}
