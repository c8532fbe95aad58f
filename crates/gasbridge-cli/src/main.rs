//! Gas meter bridge daemon.
//!
//! Reads gas meter pulses and publishes them to the MQTT broker used by
//! the HomA framework and Home Assistant.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use gasbridge_core::config::BridgeConfig;
use gasbridge_core::marker::FileMarkerStore;
use gasbridge_mqtt::bridge::{Bridge, BridgeMode};
use gasbridge_mqtt::edge::ChannelEdgeSource;

/// Gas meter module publishing to the HomA MQTT framework and Home Assistant.
#[derive(Parser, Debug)]
#[command(name = "gasbridge")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Example: gasbridge -d --broker-host my-mqtt --broker-port 8883")]
struct Args {
    /// Enable debug output.
    #[arg(short = 'd', long)]
    debug: bool,

    /// Remove all retained MQTT messages and exit.
    #[arg(short = 'r', long)]
    remove: bool,

    /// Set MQTT broker host.
    #[arg(long)]
    broker_host: Option<String>,

    /// Set MQTT broker port.
    #[arg(long)]
    broker_port: Option<u16>,

    /// Path to the add-on options file.
    #[arg(long, default_value = "/data/options.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        BridgeConfig::load_or_default(&args.config).context("loading configuration")?;
    if args.debug {
        config.debug = true;
    }
    init_tracing(config.debug);
    if config.debug {
        tracing::info!("debug output enabled");
    }
    if let Some(host) = args.broker_host {
        tracing::debug!("set config mqtt.host = {host}");
        config.mqtt.host = host;
    }
    if let Some(port) = args.broker_port {
        tracing::debug!("set config mqtt.port = {port}");
        config.mqtt.port = port;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
        // Keep the sender alive so the serving loop sees the flag, not a
        // closed channel.
        std::future::pending::<()>().await;
    });

    let markers = Arc::new(FileMarkerStore::new(&config.marker_dir));

    // The platform edge driver hands rising-edge events to this feed; it is
    // held for the daemon's lifetime so the source stays open.
    let (_edge_feed, edge_source) = ChannelEdgeSource::new(16);
    tracing::info!("edge source ready on GPIO line {}", config.gpio_pin);

    let mode = if args.remove {
        BridgeMode::Remove
    } else {
        BridgeMode::Serve
    };

    let bridge = Bridge::new(config, shutdown_rx);
    bridge.run(mode, edge_source, markers).await?;
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
