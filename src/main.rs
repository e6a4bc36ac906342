//! relayd - causal-broadcast chat relay for fully meshed datacenters.
//!
//! Each process is one datacenter: it accepts chat clients and peer
//! datacenters on a single port, tags every authored message with its causal
//! dependencies and delivers messages to each client only once everything
//! they depend on has been delivered there.

mod broker;
mod causal;
mod config;
mod error;
mod http;
mod metrics;
mod network;
mod state;
mod sync;
mod telemetry;

use crate::broker::BrokerHandle;
use crate::config::Config;
use crate::network::Gateway;
use crate::sync::{LinkSettings, spawn_outgoing};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// `relayd <config.toml>` or `relayd <port> <port> ...`.
fn load_config(args: &[String]) -> anyhow::Result<Config> {
    match args {
        [] => anyhow::bail!("usage: relayd <config.toml> | relayd <port> [<port> ...]"),
        [path] if path.parse::<u16>().is_err() => {
            let config = Config::load(path).map_err(|e| {
                error!(path = %path, error = %e, "Failed to load config");
                e
            })?;
            Ok(config)
        }
        ports => Ok(Config::from_ports(ports)?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config(&args)?;

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("configuration has {} error(s)", errors.len());
    }

    metrics::init();

    let broker = BrokerHandle::spawn(config.limits.aggregate_queue, config.limits.send_queue);
    let gateway = Gateway::bind(&config, broker.clone()).await?;

    info!(
        node = %gateway.node(),
        port = gateway.port(),
        peers = config.server.ports.len() - 1,
        "Starting relayd"
    );

    // Prometheus metrics are optional.
    match config.server.metrics_port {
        Some(port) if port != 0 => {
            let broker = broker.clone();
            tokio::spawn(async move {
                http::run_http_server(port, broker).await;
            });
            info!(port, "Prometheus HTTP server started");
        }
        _ => info!("Metrics endpoint disabled"),
    }

    // Start outgoing links to every other datacenter
    let settings = LinkSettings::from(&config);
    for peer in config.peer_addresses(gateway.port()) {
        spawn_outgoing(peer, broker.clone(), settings.clone());
    }

    gateway.run().await
}
