// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Outbound readings
//!
//! Every completed cycle produces exactly three messages: humidity, gas and
//! status. Each is handed to the transport on its own; a refused publish is
//! logged and counted but never stops the others.

use crate::alert::AlertStatus;
use crate::channel::Transport;
use crate::config::TopicConfig;
use crate::error::ChannelError;
use crate::protocol::{gas_payload, humidity_payload, status_payload, QoS};
use crate::sensor::SensorSample;
use tracing::warn;

/// Messages published per cycle
pub const MESSAGES_PER_CYCLE: u8 = 3;

/// Outcome of one cycle's publishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    /// Publishes handed to the transport
    pub attempted: u8,
    /// Topics whose publish was refused, with the reason
    pub failures: Vec<(String, ChannelError)>,
}

impl PublishReport {
    /// Number of refused publishes
    pub fn failed(&self) -> u8 {
        self.failures.len() as u8
    }

    /// Whether all publishes were accepted
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Formats readings and hands them to a [`Transport`]
#[derive(Debug)]
pub struct Publisher<T> {
    transport: T,
    topics: TopicConfig,
    qos: QoS,
}

impl<T: Transport> Publisher<T> {
    /// Create a publisher on the default topics at QoS 1
    pub fn new(transport: T) -> Self {
        Self::with_topics(transport, TopicConfig::default(), QoS::AtLeastOnce)
    }

    /// Create a publisher with explicit topics and QoS
    pub fn with_topics(transport: T, topics: TopicConfig, qos: QoS) -> Self {
        Self {
            transport,
            topics,
            qos,
        }
    }

    /// Fire-and-forget publish, retain off
    pub fn publish(&mut self, topic: &str, payload: &str) -> Result<(), ChannelError> {
        self.transport.publish(topic, payload, self.qos, false)
    }

    /// Publish humidity, gas and status for one cycle
    pub fn publish_cycle(&mut self, sample: &SensorSample, status: AlertStatus) -> PublishReport {
        let messages = [
            (
                self.topics.humidity.clone(),
                humidity_payload(sample.humidity_percent),
            ),
            (self.topics.gas.clone(), gas_payload(sample.gas_raw)),
            (
                self.topics.status.clone(),
                status_payload(status.message()),
            ),
        ];

        let mut report = PublishReport::default();
        for (topic, payload) in messages {
            report.attempted += 1;
            if let Err(e) = self.publish(&topic, &payload) {
                warn!(topic = %topic, error = %e, "publish failed");
                report.failures.push((topic, e));
            }
        }
        report
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the publisher, returning the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryTransport;
    use crate::protocol::{TOPIC_GAS, TOPIC_HUMIDITY, TOPIC_STATUS};

    #[test]
    fn test_publish_cycle_three_messages() {
        let mut publisher = Publisher::new(MemoryTransport::new());
        let report = publisher.publish_cycle(&SensorSample::new(61.3, 402), AlertStatus::Safe);

        assert_eq!(report.attempted, MESSAGES_PER_CYCLE);
        assert!(report.is_complete());

        let sent = publisher.transport_mut().drain();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].topic, TOPIC_HUMIDITY);
        assert_eq!(sent[0].payload, r#"{"umidade":61.3}"#);
        assert_eq!(sent[1].topic, TOPIC_GAS);
        assert_eq!(sent[1].payload, r#"{"mq135_raw":402}"#);
        assert_eq!(sent[2].topic, TOPIC_STATUS);
        assert_eq!(sent[2].payload, r#"{"status":"Ambiente seguro!"}"#);
        assert!(sent.iter().all(|m| m.qos == QoS::AtLeastOnce && !m.retain));
    }

    #[test]
    fn test_failures_do_not_stop_remaining_publishes() {
        let mut publisher = Publisher::new(MemoryTransport::with_buffer_size(1));
        let report = publisher.publish_cycle(&SensorSample::new(70.0, 900), AlertStatus::Alert);

        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failures[0].0, TOPIC_GAS);
        assert_eq!(report.failures[1].1, ChannelError::BufferFull);
    }

    #[test]
    fn test_disconnected_transport() {
        let mut transport = MemoryTransport::new();
        transport.disconnect();
        let mut publisher = Publisher::new(transport);

        let report = publisher.publish_cycle(&SensorSample::new(50.0, 100), AlertStatus::Safe);
        assert_eq!(report.failed(), 3);
    }

    #[test]
    fn test_custom_topics() {
        let topics = TopicConfig {
            status: "lab/status".to_string(),
            ..Default::default()
        };
        let mut publisher =
            Publisher::with_topics(MemoryTransport::new(), topics, QoS::AtMostOnce);
        publisher.publish_cycle(&SensorSample::new(65.0, 500), AlertStatus::Alert);

        let sent = publisher.into_inner().drain();
        assert_eq!(sent[2].topic, "lab/status");
        assert_eq!(sent[2].payload, r#"{"status":"Alerta de Mofo!"}"#);
        assert_eq!(sent[2].qos, QoS::AtMostOnce);
    }
}
