// Mofo - Mold risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Messaging channel abstraction
//!
//! This module provides the trait the monitor publishes through, the
//! message type inbound subscriptions are delivered as, and an in-memory
//! implementation for tests and local runs.

use crate::error::ChannelError;
use crate::protocol::QoS;
use std::collections::VecDeque;

/// Statistics about channel usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMetrics {
    /// Payload bytes handed to the transport
    pub bytes_sent: u64,
    /// Messages handed to the transport
    pub messages_sent: u64,
    /// Publishes refused by the transport
    pub send_failures: u64,
}

/// Message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Message handed to the transport for publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

/// Publish/subscribe transport.
///
/// Both calls only enqueue work; delivery and reconnection belong to the
/// implementation.
pub trait Transport {
    /// Enqueue a publish without waiting for delivery
    fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool)
        -> Result<(), ChannelError>;

    /// Enqueue a subscription request
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ChannelError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), ChannelError> {
        (**self).publish(topic, payload, qos, retain)
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ChannelError> {
        (**self).subscribe(topic, qos)
    }
}

/// A simple in-memory transport for testing and local communication
#[derive(Debug)]
pub struct MemoryTransport {
    /// Published messages, oldest first
    outbox: VecDeque<OutboundMessage>,
    /// Active subscriptions
    subscriptions: Vec<(String, QoS)>,
    /// Maximum outbox size
    max_buffer_size: usize,
    /// Whether the transport is connected
    is_open: bool,
    /// Metrics
    metrics: ChannelMetrics,
}

impl MemoryTransport {
    /// Create a new memory transport
    pub fn new() -> Self {
        Self::with_buffer_size(1000)
    }

    /// Create with custom buffer size
    pub fn with_buffer_size(max_size: usize) -> Self {
        Self {
            outbox: VecDeque::with_capacity(max_size.min(1024)),
            subscriptions: Vec::new(),
            max_buffer_size: max_size,
            is_open: true,
            metrics: ChannelMetrics::default(),
        }
    }

    /// Pop the oldest published message (simulate delivery)
    pub fn pop_outgoing(&mut self) -> Option<OutboundMessage> {
        self.outbox.pop_front()
    }

    /// Drain every published message
    pub fn drain(&mut self) -> Vec<OutboundMessage> {
        self.outbox.drain(..).collect()
    }

    /// Number of pending outgoing messages
    pub fn pending_outgoing(&self) -> usize {
        self.outbox.len()
    }

    /// Active subscriptions
    pub fn subscriptions(&self) -> &[(String, QoS)] {
        &self.subscriptions
    }

    /// Simulate a dropped connection
    pub fn disconnect(&mut self) {
        self.is_open = false;
    }

    /// Simulate a restored connection
    pub fn reconnect(&mut self) {
        self.is_open = true;
    }

    /// Channel metrics
    pub fn metrics(&self) -> ChannelMetrics {
        self.metrics.clone()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), ChannelError> {
        if !self.is_open {
            self.metrics.send_failures += 1;
            return Err(ChannelError::Disconnected {
                reason: "Transport is closed".to_string(),
            });
        }

        if self.outbox.len() >= self.max_buffer_size {
            self.metrics.send_failures += 1;
            return Err(ChannelError::BufferFull);
        }

        self.outbox.push_back(OutboundMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            retain,
        });

        self.metrics.bytes_sent += payload.len() as u64;
        self.metrics.messages_sent += 1;

        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ChannelError> {
        if !self.is_open {
            return Err(ChannelError::Disconnected {
                reason: "Transport is closed".to_string(),
            });
        }

        // Subscribe requests queue behind pending publishes.
        if self.outbox.len() >= self.max_buffer_size {
            return Err(ChannelError::BufferFull);
        }

        self.subscriptions.retain(|(t, _)| t != topic);
        self.subscriptions.push((topic.to_string(), qos));
        Ok(())
    }
}
