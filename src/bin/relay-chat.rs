//! relay-chat - interactive chat client for a relayd datacenter.
//!
//! `relay-chat <datacenter-port> <callback-port> [<callback-port> ...]`
//!
//! Listens on the first free callback port, attaches to the datacenter on
//! localhost, then sends every stdin line and prints every line pushed back
//! over the callback connection.

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use relay_proto::{LineCodec, Role};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const HOST: &str = "localhost";

/// Bind the first callback port that is free.
async fn bind_callback(ports: &[String]) -> anyhow::Result<(TcpListener, &str)> {
    for port in ports {
        info!(host = HOST, %port, "Trying callback port");
        match TcpListener::bind(format!("{HOST}:{port}")).await {
            Ok(listener) => {
                info!(%port, "Got callback port");
                return Ok((listener, port.as_str()));
            }
            Err(e) => warn!(%port, error = %e, "Callback port taken"),
        }
    }
    anyhow::bail!("could not get a callback port")
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout carries the chat.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    // A pending stdin read cannot be cancelled, so exit instead of waiting
    // for the runtime to shut down.
    if let Err(e) = run(&args).await {
        error!(error = ?e, "relay-chat stopped");
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> anyhow::Result<()> {
    let [datacenter_port, callback_ports @ ..] = args else {
        anyhow::bail!("usage: relay-chat <datacenter-port> <callback-port> [<callback-port> ...]");
    };

    let (listener, callback_port) = bind_callback(callback_ports).await?;

    let datacenter = TcpStream::connect(format!("{HOST}:{datacenter_port}"))
        .await
        .with_context(|| format!("couldn't connect to datacenter on port {datacenter_port}"))?;
    let mut outgoing = FramedWrite::new(datacenter, LineCodec::new());
    outgoing.feed(Role::Client.as_str().to_string()).await?;
    outgoing.feed(format!("{HOST}:{callback_port}")).await?;
    SinkExt::<String>::flush(&mut outgoing).await.context("couldn't write to datacenter")?;

    let (callback, addr) = listener
        .accept()
        .await
        .context("couldn't accept the datacenter's callback")?;
    info!(%addr, "Ready to go, start chatting");

    let mut stdin = FramedRead::new(tokio::io::stdin(), LineCodec::new());
    let mut incoming = FramedRead::new(callback, LineCodec::new());
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = stdin.next(), if stdin_open => match line {
                Some(Ok(line)) => {
                    outgoing.send(line).await.context("couldn't write message to datacenter")?;
                }
                Some(Err(e)) => warn!(error = %e, "Couldn't read from stdin"),
                None => stdin_open = false,
            },
            line = incoming.next() => match line {
                Some(Ok(line)) => println!("{line}"),
                Some(Err(e)) => {
                    return Err(e).context("couldn't read message from datacenter");
                }
                None => anyhow::bail!("datacenter closed the connection"),
            },
        }
    }
}
