//! vaga-bridge - MQTT to HTTP bridge for parking-space telemetry
//!
//! Re-assembles fragmented sensor messages (distance, noise, status) into
//! complete per-space records and forwards each completed record once per
//! cycle to the upstream ingestion endpoint.
//!
//! Module structure:
//! - `domain/` - Core types (SpaceRecord, Fragment, SpaceStatus)
//! - `io/` - External interfaces (MQTT ingest, HTTP forwarder)
//! - `services/` - Aggregation logic (RecordStore, Bridge)
//! - `infra/` - Infrastructure (Config, Metrics, embedded Broker)

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use vaga_bridge::infra::{Config, Metrics};
use vaga_bridge::io::HttpForwarder;
use vaga_bridge::services::Bridge;

/// vaga-bridge - parking sensor telemetry aggregator
#[derive(Parser, Debug)]
#[command(name = "vaga-bridge", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("vaga-bridge starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        mqtt_host = %config.mqtt_host(),
        mqtt_port = %config.mqtt_port(),
        mqtt_topic = %config.mqtt_topic(),
        upstream_url = %config.upstream_url(),
        upstream_timeout_ms = %config.upstream_timeout_ms(),
        broker_enabled = %config.broker_enabled(),
        "config_loaded"
    );

    // Start embedded MQTT broker if enabled (development setups)
    if config.broker_enabled() {
        vaga_bridge::infra::broker::start_embedded_broker(&config);
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());

    let forwarder = Arc::new(HttpForwarder::new(
        config.upstream_url(),
        Duration::from_millis(config.upstream_timeout_ms()),
    )?);

    // Fragment channel (bounded for backpressure)
    let (fragment_tx, fragment_rx) = mpsc::channel(1000);

    // Start MQTT client
    let mqtt_config = config.clone();
    let mqtt_metrics = metrics.clone();
    let mqtt_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = vaga_bridge::io::mqtt::start_mqtt_client(
            &mqtt_config,
            fragment_tx,
            mqtt_metrics,
            mqtt_shutdown,
        )
        .await
        {
            tracing::error!(error = %e, "MQTT client error");
        }
    });

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            // Tracked-space count lives in the bridge; report counters only
            metrics_clone.report(0).log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run bridge - consumes fragments until the channel closes
    let mut bridge = Bridge::new(forwarder, metrics);
    info!("bridge_started");
    bridge.run(fragment_rx).await;

    info!("vaga-bridge shutdown complete");
    Ok(())
}
