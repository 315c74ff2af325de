// Mofo Agent - MQTT transport
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! MQTT binding for the monitor.
//!
//! [`MqttTransport`] enqueues requests on the client without waiting, so the
//! sampling loop never blocks on the network. [`drive_event_loop`] owns the
//! connection: it reconnects, re-subscribes to the threshold topics after
//! every `ConnAck`, and forwards inbound publishes to the handler task.
//!
//! A `ConnAck` can arrive while the client's request queue is still full of
//! publishes made during the outage. Subscriptions refused then stay owed to
//! the session and are retried after every later event until accepted.

use crate::metrics::set_broker_connected;
use mofo::{subscribe_thresholds, ChannelError, InboundMessage, QoS, TopicConfig, Transport};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Delay before polling again after a connection error
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Requests the client buffers before `try_*` calls are refused
    pub request_capacity: usize,
}

impl BrokerConfig {
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        options
    }

    /// Create the client and its (not yet polled) event loop
    pub fn connect(&self) -> (AsyncClient, EventLoop) {
        AsyncClient::new(self.options(), self.request_capacity)
    }
}

pub fn to_rumqttc_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

fn map_client_error(error: ClientError) -> ChannelError {
    match error {
        ClientError::TryRequest(_) => ChannelError::BufferFull,
        other => ChannelError::Disconnected {
            reason: other.to_string(),
        },
    }
}

/// [`Transport`] over a `rumqttc` client
#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl Transport for MqttTransport {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        qos: QoS,
        retain: bool,
    ) -> Result<(), ChannelError> {
        self.client
            .try_publish(topic, to_rumqttc_qos(qos), retain, payload.as_bytes().to_vec())
            .map_err(map_client_error)
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ChannelError> {
        self.client
            .try_subscribe(topic, to_rumqttc_qos(qos))
            .map_err(map_client_error)
    }
}

/// Threshold subscriptions owed to the current broker session
#[derive(Debug, Clone)]
pub struct ThresholdSubscriptions {
    topics: TopicConfig,
    qos: QoS,
    pending: bool,
}

impl ThresholdSubscriptions {
    pub fn new(topics: TopicConfig, qos: QoS) -> Self {
        Self {
            topics,
            qos,
            pending: false,
        }
    }

    /// A new session has no subscriptions; owe them and try once.
    pub fn on_connack<T: Transport + ?Sized>(&mut self, transport: &mut T) -> bool {
        self.pending = true;
        let done = self.retry(transport);
        if !done {
            warn!("threshold subscriptions deferred until the request queue drains");
        }
        done
    }

    /// Nothing can be subscribed until the next `ConnAck`.
    pub fn on_connection_lost(&mut self) {
        self.pending = false;
    }

    /// Issue owed subscriptions. Returns true once none are owed.
    pub fn retry<T: Transport + ?Sized>(&mut self, transport: &mut T) -> bool {
        if !self.pending {
            return true;
        }
        match subscribe_thresholds(transport, &self.topics, self.qos) {
            Ok(()) => {
                info!("threshold subscriptions established");
                self.pending = false;
            }
            Err(e) => debug!(error = %e, "threshold subscription refused"),
        }
        !self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Poll the event loop forever.
///
/// `connected` tracks the session state; inbound publishes are offered to
/// `inbound` without waiting and dropped with a warning when it is full.
pub async fn drive_event_loop(
    mut eventloop: EventLoop,
    mut transport: MqttTransport,
    topics: TopicConfig,
    subscribe_qos: QoS,
    inbound: mpsc::Sender<InboundMessage>,
    connected: watch::Sender<bool>,
) {
    let mut subscriptions = ThresholdSubscriptions::new(topics, subscribe_qos);

    loop {
        let event = eventloop.poll().await;
        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(code = ?ack.code, "broker connected");
                connected.send_replace(true);
                set_broker_connected(true);

                // Subscriptions do not survive a clean session.
                subscriptions.on_connack(&mut transport);
                continue;
            }

            Ok(Event::Incoming(Packet::Publish(p))) => {
                debug!(topic = %p.topic, bytes = p.payload.len(), "inbound message");
                let message = InboundMessage::new(p.topic, p.payload.to_vec());
                match inbound.try_send(message) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(m)) => {
                        warn!(topic = %m.topic, "inbound queue full, dropping message");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        warn!("threshold handler stopped, ending event loop");
                        return;
                    }
                }
            }

            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("broker disconnected");
                connected.send_replace(false);
                set_broker_connected(false);
                subscriptions.on_connection_lost();
                continue;
            }

            Ok(_) => {}

            Err(e) => {
                if *connected.borrow() {
                    connected.send_replace(false);
                    set_broker_connected(false);
                }
                subscriptions.on_connection_lost();
                error!(error = %e, "mqtt connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
        }

        // Every event drains the request queue a little.
        if subscriptions.is_pending() {
            subscriptions.retry(&mut transport);
        }
    }
}
