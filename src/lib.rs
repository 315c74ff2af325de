//! # Mofo - Mold risk monitor
//!
//! Watches relative humidity and a gas-sensor proxy, publishes the readings
//! over MQTT every cycle, and raises a debounced mold-risk alert. Operators
//! retune the alert thresholds at runtime over the same broker.
//!
//! ## Key Features
//!
//! - **Debounced alert**: raised after three qualifying samples in a row,
//!   cleared by a single clean one
//! - **Live thresholds**: lock-free store shared by the sampling loop and the
//!   inbound message task
//! - **Hardened inputs**: failed sensor reads skip the cycle, malformed
//!   threshold payloads are rejected instead of zeroing the threshold
//! - **Transport agnostic**: anything implementing [`Transport`] can carry
//!   the readings
//!
//! ## Quick Start
//!
//! ```rust
//! use mofo::{
//!     AlertStatus, MemoryTransport, Monitor, Publisher, ScriptedSource, ThresholdStore,
//!     ThresholdUpdateHandler, TOPIC_HUMIDITY_THRESHOLD,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(ThresholdStore::new());
//! let source = ScriptedSource::from_pairs(&[(61.0, 400), (62.0, 360), (59.0, 500)]);
//! let mut monitor = Monitor::new(source, Publisher::new(MemoryTransport::new()), Arc::clone(&store));
//!
//! monitor.run_cycle();
//! monitor.run_cycle();
//!
//! // Operator lowers the humidity threshold between cycles
//! let handler = ThresholdUpdateHandler::new(store);
//! handler.handle(TOPIC_HUMIDITY_THRESHOLD, b"50.0").unwrap();
//!
//! monitor.run_cycle();
//! assert_eq!(monitor.state().status(), AlertStatus::Alert);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Topics, status strings and payload formats
//! - [`thresholds`]: Shared threshold store
//! - [`sensor`]: Sensor driver contracts and sample sources
//! - [`alert`]: Debounce state machine
//! - [`publisher`]: Per-cycle outbound messages
//! - [`handler`]: Inbound threshold updates
//! - [`scheduler`]: Cycle and periodic loop
//! - [`channel`]: Messaging transport abstraction
//! - [`config`]: TOML configuration
//! - [`metrics`]: Runtime counters

// Modules
pub mod alert;
pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod protocol;
pub mod publisher;
pub mod scheduler;
pub mod sensor;
pub mod thresholds;

// Re-exports for convenient access
pub use alert::{evaluate, AlertState, AlertStatus, Transition, CONSECUTIVE_READINGS_THRESHOLD};
pub use channel::{ChannelMetrics, InboundMessage, MemoryTransport, OutboundMessage, Transport};
pub use config::{MonitorConfig, TopicConfig, DEFAULT_PERIOD_MS};
pub use error::{
    ChannelError, ConfigError, MofoError, Result, SensorError, ThresholdParseError,
};
pub use handler::{subscribe_thresholds, ThresholdUpdateHandler, UpdateOutcome};
pub use metrics::{MetricsSnapshot, MonitorMetrics};
pub use protocol::{
    QoS, ALERT_MESSAGE, SAFE_MESSAGE, TOPIC_GAS, TOPIC_GAS_THRESHOLD, TOPIC_HUMIDITY,
    TOPIC_HUMIDITY_THRESHOLD, TOPIC_STATUS,
};
pub use publisher::{PublishReport, Publisher};
pub use scheduler::{CycleOutcome, Monitor, Scheduler};
pub use sensor::{
    AdcConfig, Attenuation, GasChannel, HumiditySensor, RawHumidityReading, Resolution,
    SampleSource, ScriptedSource, SensorReader, SensorSample,
};
pub use thresholds::{ThresholdConfig, ThresholdStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
