//! LinkPulse - Connectivity Log Monitor
//!
//! Tails a newline-delimited JSON log of network-probe measurements,
//! serves per-day summaries to a dashboard, and relays each
//! measurement to MQTT.

mod config;
mod record;
mod relay;
mod summary;
mod tail;
mod web;

use config::ServerConfig;
use relay::{MqttPublisher, RecordRelay};
use summary::SummaryCache;
use web::Server;

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("linkpulse=info".parse()?),
        )
        .init();

    // Load configuration
    let cfg = Arc::new(ServerConfig::load());
    tracing::info!("Starting LinkPulse on port {}...", cfg.http_port);
    tracing::info!("Tailing probe log at {}", cfg.log_path.display());

    // Incremental daily summary cache
    let cache = Arc::new(SummaryCache::new(&cfg.log_path));

    // MQTT relay, if enabled
    let relay = if cfg.mqtt.enabled {
        let publisher = Arc::new(MqttPublisher::connect(&cfg.mqtt));
        let relay = RecordRelay::new(
            &cfg.log_path,
            &cfg.mqtt.topic_prefix,
            Duration::from_secs(cfg.relay_poll_seconds.max(1)),
            publisher,
        );
        relay.start();
        tracing::info!(
            "MQTT relay enabled: sending measurements to {}:{} on prefix {}",
            cfg.mqtt.host,
            cfg.mqtt.port,
            cfg.mqtt.topic_prefix
        );
        Some(relay)
    } else {
        None
    };

    // Start web server
    let server = Server::new(cfg, cache);
    server.start(shutdown_signal()).await?;

    if let Some(relay) = relay {
        relay.stop().await;
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
