// Mofo Agent - MQTT mold-risk monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Mofo Agent
//!
//! Runs the mold-risk monitor against an MQTT broker and exposes its state
//! to Prometheus.
//!
//! ## Usage
//!
//! ```bash
//! # Simulated sensors against a local broker
//! mofo-agent --broker-host localhost
//!
//! # Replay recorded readings, ten cycles, one second apart
//! mofo-agent --csv readings.csv --period-secs 1 --cycles 10
//!
//! # Load a TOML configuration and serve metrics on another port
//! mofo-agent --config mofo.toml --metrics-port 9200
//! ```

mod metrics;
mod mqtt;
#[cfg(feature = "replay")]
mod replay;
mod source;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use metrics::{encode_metrics, update_counter_metrics, update_cycle_metrics, update_threshold_metrics};
use mofo::{
    AlertStatus, MonitorConfig, MonitorMetrics, Monitor, Publisher, SampleSource, Scheduler,
    SensorReader, ThresholdConfig, ThresholdStore, ThresholdUpdateHandler, VERSION,
};
use mqtt::{drive_event_loop, BrokerConfig, MqttTransport};
use serde::Serialize;
use source::{SimulatedGas, SimulatedHumidity};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "replay")]
use replay::{ReplaySource, ReplayState};

/// Mofo mold-risk monitor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// MQTT broker host
    #[arg(long, env = "MOFO_BROKER_HOST", default_value = "localhost")]
    broker_host: String,

    /// MQTT broker port
    #[arg(long, env = "MOFO_BROKER_PORT", default_value = "1883")]
    broker_port: u16,

    /// MQTT client identifier
    #[arg(long, default_value = "mofo-agent")]
    client_id: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the sampling period (seconds)
    #[arg(long)]
    period_secs: Option<u64>,

    /// Replay recorded readings instead of simulating sensors
    #[arg(short, long)]
    csv: Option<PathBuf>,

    /// Loop the replay when it reaches the end
    #[arg(long, default_value = "false")]
    loop_replay: bool,

    /// Stop after this many cycles
    #[arg(long)]
    cycles: Option<usize>,

    /// Seed for the simulated sensors
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Fraction of simulated humidity reads that fail (0.0-1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_failure_rate)]
    failure_rate: f64,

    /// Port for /metrics, /health and /status
    #[arg(long, default_value = "9100")]
    metrics_port: u16,

    /// Inbound threshold messages buffered before dropping
    #[arg(long, default_value = "16")]
    inbound_capacity: usize,

    /// Seconds to wait for the broker before sampling anyway
    #[arg(long, default_value = "10")]
    connect_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    store: Arc<ThresholdStore>,
    metrics: Arc<MonitorMetrics>,
    connected: watch::Receiver<bool>,
    #[cfg(feature = "replay")]
    replay_state: Option<Arc<ReplayState>>,
    start_time: std::time::Instant,
}

type BoxedSource = Box<dyn SampleSource + Send>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Mofo Agent v{}", VERSION);

    let config = load_config(&args)?;
    let store = Arc::new(ThresholdStore::with_config(config.thresholds));
    let monitor_metrics = Arc::new(MonitorMetrics::new());
    update_threshold_metrics(&store.snapshot());

    // Broker connection
    let broker = BrokerConfig {
        host: args.broker_host.clone(),
        port: args.broker_port,
        client_id: args.client_id.clone(),
        keep_alive: Duration::from_secs(30),
        request_capacity: 32,
    };
    let (client, eventloop) = broker.connect();
    let (connected_tx, mut connected_rx) = watch::channel(false);
    let transport = MqttTransport::new(client.clone());

    // Threshold updates are applied off the sampling task
    let (inbound_tx, inbound_rx) = mpsc::channel(args.inbound_capacity.max(1));
    let handler = ThresholdUpdateHandler::with_topics(Arc::clone(&store), config.topics.clone())
        .with_metrics(Arc::clone(&monitor_metrics));
    tokio::spawn(handler.run(inbound_rx));

    tokio::spawn(drive_event_loop(
        eventloop,
        transport.clone(),
        config.topics.clone(),
        config.subscribe_qos,
        inbound_tx,
        connected_tx,
    ));

    info!(
        "Connecting to mqtt://{}:{}",
        args.broker_host, args.broker_port
    );
    let connect_timeout = Duration::from_secs(args.connect_timeout_secs);
    match tokio::time::timeout(connect_timeout, connected_rx.wait_for(|c| *c)).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => anyhow::bail!("mqtt event loop stopped before connecting"),
        Err(_) => warn!(
            timeout_secs = args.connect_timeout_secs,
            "broker not reachable yet, sampling anyway"
        ),
    }

    // Sensor source
    #[cfg(feature = "replay")]
    let (source, replay_state) = build_source(&args, &config)?;
    #[cfg(not(feature = "replay"))]
    let source = build_source(&args, &config)?;

    // HTTP endpoints
    let state = Arc::new(AppState {
        store: Arc::clone(&store),
        metrics: Arc::clone(&monitor_metrics),
        connected: connected_rx,
        #[cfg(feature = "replay")]
        replay_state,
        start_time: std::time::Instant::now(),
    });

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.metrics_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Metrics endpoint: http://{}/metrics", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "http server stopped");
        }
    });

    // Sampling loop
    let publisher = Publisher::with_topics(transport, config.topics.clone(), config.publish_qos);
    let monitor = Monitor::new(source, publisher, Arc::clone(&store))
        .with_metrics(Arc::clone(&monitor_metrics));
    let mut scheduler = Scheduler::new(monitor, config.period());

    let cycle_metrics = Arc::clone(&monitor_metrics);
    let sampling = async {
        match args.cycles {
            Some(cycles) => {
                for outcome in scheduler.run_for(cycles).await {
                    update_cycle_metrics(&outcome);
                }
                update_counter_metrics(&cycle_metrics.snapshot());
                info!(cycles, "requested cycles completed");
            }
            None => {
                scheduler
                    .run_with(|outcome| {
                        update_cycle_metrics(outcome);
                        update_counter_metrics(&cycle_metrics.snapshot());
                    })
                    .await
            }
        }
    };

    tokio::select! {
        _ = sampling => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    let summary = monitor_metrics.snapshot();
    info!(
        published = summary.cycles_published,
        skipped = summary.cycles_skipped,
        alerts = summary.alerts_raised,
        "stopping"
    );

    // Give queued publishes a chance to leave before the session closes.
    if let Err(e) = client.disconnect().await {
        warn!(error = %e, "disconnect request failed");
    }
    Ok(())
}

fn parse_failure_rate(text: &str) -> Result<f64, String> {
    let rate: f64 = text
        .parse()
        .map_err(|_| format!("'{text}' is not a number"))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("'{text}' is not between 0.0 and 1.0"));
    }
    Ok(rate)
}

/// Defaults, then the TOML file, then command-line overrides.
fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => MonitorConfig::default(),
    };

    if let Some(secs) = args.period_secs {
        config.period_ms = secs.saturating_mul(1000);
    }

    config.validate().context("invalid configuration")?;
    info!(
        period_ms = config.period_ms,
        humidity_threshold = config.thresholds.humidity_threshold,
        gas_threshold = config.thresholds.gas_threshold,
        "configuration loaded"
    );
    Ok(config)
}

fn simulated_source(args: &Args, config: &MonitorConfig) -> anyhow::Result<BoxedSource> {
    let reader = SensorReader::new(
        SimulatedHumidity::new(args.seed, config.thresholds.humidity_threshold, args.failure_rate),
        SimulatedGas::new(args.seed.wrapping_add(1), 300),
        config.adc,
    )?;
    info!(seed = args.seed, "using simulated sensors");
    let source: BoxedSource = Box::new(reader);
    Ok(source)
}

#[cfg(feature = "replay")]
fn build_source(
    args: &Args,
    config: &MonitorConfig,
) -> anyhow::Result<(BoxedSource, Option<Arc<ReplayState>>)> {
    match &args.csv {
        Some(path) => {
            let replay = ReplaySource::from_csv(path, config.adc, args.loop_replay)
                .with_context(|| format!("failed to load replay {}", path.display()))?;
            info!(path = %path.display(), samples = replay.len(), "replaying recorded readings");
            let state = replay.state();
            let source: BoxedSource = Box::new(replay);
            Ok((source, Some(state)))
        }
        None => Ok((simulated_source(args, config)?, None)),
    }
}

#[cfg(not(feature = "replay"))]
fn build_source(args: &Args, config: &MonitorConfig) -> anyhow::Result<BoxedSource> {
    if args.csv.is_some() {
        warn!("Replay feature not enabled, ignoring --csv argument");
    }
    simulated_source(args, config)
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Mofo Agent</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Mofo Agent</h1>
    <p>Mold-risk monitor: humidity and gas readings over MQTT.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div><a href="/health">/health</a> - Health check</div>
        <div><a href="/ready">/ready</a> - Broker connected</div>
        <div><a href="/status">/status</a> - Thresholds and alert state (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>mofo_humidity_percent</code>, <code>mofo_gas_raw</code> - Last readings</li>
        <li><code>mofo_humidity_threshold_percent</code>, <code>mofo_gas_threshold</code> - Live thresholds</li>
        <li><code>mofo_consecutive_count</code> - Debounce counter</li>
        <li><code>mofo_alert_active</code> - Alert status (1=alert)</li>
        <li><code>mofo_cycles_*_total</code>, <code>mofo_threshold_*_total</code> - Counters</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        encode_metrics(),
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Ready once the broker session is up.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if *state.connected.borrow() {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Broker not connected")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: &'static str,
    uptime_secs: u64,
    broker_connected: bool,
    thresholds: ThresholdConfig,
    alert: &'static str,
    consecutive_count: u8,
    cycles_published: u64,
    cycles_skipped: u64,
    threshold_updates: u64,
    threshold_rejects: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay: Option<ReplayStatus>,
}

/// Replay status information.
#[derive(Serialize)]
struct ReplayStatus {
    position: usize,
    total_samples: usize,
    passes: usize,
    exhausted: bool,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    #[cfg(feature = "replay")]
    let replay = state.replay_state.as_ref().map(|r| {
        use std::sync::atomic::Ordering;
        ReplayStatus {
            position: r.position.load(Ordering::SeqCst),
            total_samples: r.total_samples.load(Ordering::SeqCst),
            passes: r.passes.load(Ordering::SeqCst),
            exhausted: r.exhausted.load(Ordering::SeqCst),
        }
    });

    #[cfg(not(feature = "replay"))]
    let replay: Option<ReplayStatus> = None;

    let alert = if metrics::ALERT_ACTIVE.get() > 0.0 {
        AlertStatus::Alert
    } else {
        AlertStatus::Safe
    };
    let counters = state.metrics.snapshot();

    Json(StatusResponse {
        version: VERSION,
        uptime_secs: state.start_time.elapsed().as_secs(),
        broker_connected: *state.connected.borrow(),
        thresholds: state.store.snapshot(),
        alert: alert.message(),
        consecutive_count: metrics::CONSECUTIVE_COUNT.get() as u8,
        cycles_published: counters.cycles_published,
        cycles_skipped: counters.cycles_skipped,
        threshold_updates: counters.updates_applied,
        threshold_rejects: counters.updates_rejected,
        replay,
    })
}
