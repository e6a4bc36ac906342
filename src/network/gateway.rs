//! Gateway - TCP listener that accepts clients and peer datacenters.
//!
//! Every accepted connection first sends a role line. Clients become
//! [`ClientSession`]s; datacenters become incoming links. Anything else is
//! closed without touching the broker.

use crate::broker::BrokerHandle;
use crate::config::Config;
use crate::network::ClientSession;
use crate::state::HostIdGenerator;
use crate::sync::run_incoming;
use crate::telemetry::spans;
use futures_util::StreamExt;
use relay_proto::{LineCodec, Role, WireCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, error, info, warn};

/// Per-connection settings shared by every accepted connection.
struct Shared {
    broker: BrokerHandle,
    host_ids: HostIdGenerator,
    client_queue: usize,
    datacenter_queue: usize,
    max_line_length: usize,
}

/// The Gateway accepts incoming TCP connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    port: u16,
    node: String,
    shared: Arc<Shared>,
}

impl Gateway {
    /// Bind the first configured port that is free.
    pub async fn bind(config: &Config, broker: BrokerHandle) -> anyhow::Result<Self> {
        let mut last_error = None;
        for &port in &config.server.ports {
            match TcpListener::bind((config.server.host.as_str(), port)).await {
                Ok(listener) => {
                    let node = config.node_name(port);
                    info!(host = %config.server.host, port, %node, "Listener bound");
                    let shared = Shared {
                        broker,
                        host_ids: HostIdGenerator::new(node.clone()),
                        client_queue: config.limits.client_queue,
                        datacenter_queue: config.limits.datacenter_queue,
                        max_line_length: config.limits.max_line_length,
                    };
                    return Ok(Self {
                        listener,
                        port,
                        node,
                        shared: Arc::new(shared),
                    });
                }
                Err(e) => {
                    debug!(port, error = %e, "Port unavailable");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(anyhow::anyhow!("no configured port could be bound: {e}")),
            None => Err(anyhow::anyhow!("no ports configured")),
        }
    }

    /// The port this datacenter listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// This datacenter's name.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Run the gateway, accepting connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let local = self.listener.local_addr()?;
        let span = spans::gateway(&local.to_string());
        self.accept_loop().instrument(span).await
    }

    async fn accept_loop(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "Connection accepted");
                    let shared = Arc::clone(&self.shared);
                    tokio::spawn(handle_connection(stream, addr, shared));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Read the role line and hand the connection to its handler.
async fn handle_connection(stream: TcpStream, addr: SocketAddr, shared: Arc<Shared>) {
    let mut framed = Framed::new(stream, LineCodec::with_max_len(shared.max_line_length));

    let line = match framed.next().await {
        Some(Ok(line)) => line,
        Some(Err(e)) => {
            warn!(%addr, error = %e, "Failed to read role line");
            return;
        }
        None => {
            debug!(%addr, "Connection closed before role line");
            return;
        }
    };

    match line.parse::<Role>() {
        Ok(Role::Client) => {
            let host = shared.host_ids.next();
            let span = spans::session(host.as_str(), &addr.to_string());
            let session = ClientSession::new(
                host,
                addr,
                shared.broker.clone(),
                shared.client_queue,
                shared.max_line_length,
            );
            async move {
                if let Err(e) = session.run(framed).await {
                    warn!(error = %e, code = e.error_code(), "Client session ended");
                }
            }
            .instrument(span)
            .await;
        }
        Ok(Role::Datacenter) => {
            let max_line_length = shared.max_line_length;
            let framed = framed.map_codec(|_| WireCodec::with_max_len(max_line_length));
            let span = spans::link(&addr.to_string(), "incoming");
            let broker = shared.broker.clone();
            async move {
                match run_incoming(framed, broker, shared.datacenter_queue, addr).await {
                    Ok(()) => info!("Peer datacenter disconnected"),
                    Err(e) => warn!(error = %e, code = e.error_code(), "Incoming link ended"),
                }
            }
            .instrument(span)
            .await;
        }
        Err(e) => {
            warn!(%addr, error = %e, "Rejecting connection");
        }
    }
}
