//! Datacenter links.
//!
//! An outgoing link dials one peer, announces itself with the `datacenter`
//! role line and then streams every message the broker hands it, each after
//! its own random delay. The receiving side is an inbound-only endpoint fed
//! by the gateway once a peer has announced itself.

use crate::broker::{BrokerHandle, EndpointId, Registration};
use crate::config::Config;
use crate::error::LinkError;
use crate::sync::backoff::Backoff;
use crate::telemetry::spans;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use relay_proto::{LineCodec, Message, Role, WireCodec};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, info, warn};

/// Link timing and capacities, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub max_delay: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub queue: usize,
    pub max_line_length: usize,
}

impl From<&Config> for LinkSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_delay: config.links.max_delay(),
            initial_backoff: config.links.initial_backoff(),
            max_backoff: config.links.max_backoff(),
            queue: config.limits.datacenter_queue,
            max_line_length: config.limits.max_line_length,
        }
    }
}

/// Uniformly random delay in `[0, max]`, millisecond granularity.
fn random_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Spawn the link to `peer`. It redials forever until the broker stops.
pub fn spawn_outgoing(
    peer: String,
    broker: BrokerHandle,
    settings: LinkSettings,
) -> JoinHandle<()> {
    let span = spans::link(&peer, "outgoing");
    tokio::spawn(run_outgoing(peer, broker, settings).instrument(span))
}

async fn run_outgoing(peer: String, broker: BrokerHandle, settings: LinkSettings) {
    let mut backoff = Backoff::new(settings.initial_backoff, settings.max_backoff);

    loop {
        let stream = match TcpStream::connect(&peer).await {
            Ok(stream) => stream,
            Err(e) => {
                let delay = backoff.next_delay();
                warn!(
                    %peer,
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "Failed to dial peer datacenter"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        backoff.reset();
        info!(%peer, "Connected to peer datacenter");

        match serve_outgoing(stream, &broker, &settings).await {
            LinkError::BrokerClosed => {
                info!(%peer, "Broker stopped, dropping link");
                return;
            }
            LinkError::PeerClosed => info!(%peer, "Peer datacenter closed the link"),
            e => warn!(%peer, error = %e, code = e.error_code(), "Link to peer datacenter failed"),
        }

        // A peer that accepts and hangs up at once must not make us spin.
        tokio::time::sleep(backoff.next_delay()).await;
    }
}

/// One connection's lifetime: handshake, register, stream, deregister.
/// Returns why the connection ended.
async fn serve_outgoing(
    stream: TcpStream,
    broker: &BrokerHandle,
    settings: &LinkSettings,
) -> LinkError {
    let (id, framed, deliveries) = match attach(stream, broker, settings).await {
        Ok(attached) => attached,
        Err(e) => return e,
    };
    let error = pump(id, framed, deliveries, settings).await;
    broker.deregister(id).await;
    error
}

async fn attach(
    stream: TcpStream,
    broker: &BrokerHandle,
    settings: &LinkSettings,
) -> Result<(EndpointId, Framed<TcpStream, WireCodec>, mpsc::Receiver<Arc<Message>>), LinkError> {
    let mut framed = Framed::new(stream, LineCodec::with_max_len(settings.max_line_length));
    framed.send(Role::Datacenter.as_str().to_string()).await?;
    let max_line_length = settings.max_line_length;
    let framed = framed.map_codec(|_| WireCodec::with_max_len(max_line_length));

    let (outbound, deliveries) = mpsc::channel(settings.queue);
    let id = broker
        .register(Registration::datacenter_outgoing(outbound))
        .await
        .map_err(|_| LinkError::BrokerClosed)?;
    Ok((id, framed, deliveries))
}

/// Hand `message` to `ready` once `delay` has passed, on its own timer.
fn schedule_after(delay: Duration, message: Arc<Message>, ready: mpsc::Sender<Arc<Message>>) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = ready.send(message).await;
    });
}

/// Delay each delivery and write it once its timer fires. Runs until the
/// connection or the broker lets go.
async fn pump(
    id: EndpointId,
    mut framed: Framed<TcpStream, WireCodec>,
    mut deliveries: mpsc::Receiver<Arc<Message>>,
    settings: &LinkSettings,
) -> LinkError {
    let (ready_tx, mut ready_rx) = mpsc::channel::<Arc<Message>>(settings.queue);

    loop {
        let written = tokio::select! {
            delivery = deliveries.recv() => {
                let Some(message) = delivery else {
                    return LinkError::Evicted;
                };
                let delay = random_delay(settings.max_delay);
                debug!(
                    endpoint = id,
                    id = %message.id,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling message"
                );
                if delay.is_zero() {
                    framed.send(message).await
                } else {
                    schedule_after(delay, message, ready_tx.clone());
                    Ok(())
                }
            }
            Some(message) = ready_rx.recv() => framed.send(message).await,
            incoming = framed.next() => match incoming {
                None => return LinkError::PeerClosed,
                Some(Err(e)) => Err(e),
                Some(Ok(stray)) => {
                    debug!(endpoint = id, id = %stray.id, "Ignoring message on outgoing link");
                    Ok(())
                }
            },
        };
        if let Err(e) = written {
            return e.into();
        }
    }
}

/// Serve a peer's outgoing link after its role line has been read.
///
/// Every decoded message goes onto the broker; the first undecodable line
/// ends the link.
pub async fn run_incoming(
    framed: Framed<TcpStream, WireCodec>,
    broker: BrokerHandle,
    queue: usize,
    addr: SocketAddr,
) -> Result<(), LinkError> {
    let (inbound_tx, inbound) = mpsc::channel(queue);
    let id = broker
        .register(Registration::datacenter_incoming(inbound))
        .await
        .map_err(|_| LinkError::BrokerClosed)?;
    info!(endpoint = id, %addr, "Peer datacenter attached");

    let result = forward(framed, inbound_tx).await;
    broker.deregister(id).await;
    result
}

async fn forward(
    mut framed: Framed<TcpStream, WireCodec>,
    inbound: mpsc::Sender<Arc<Message>>,
) -> Result<(), LinkError> {
    while let Some(decoded) = framed.next().await {
        let message = decoded?;
        debug!(id = %message.id, "Received from peer datacenter");
        inbound
            .send(Arc::new(message))
            .await
            .map_err(|_| LinkError::BrokerClosed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_proto::{MessageId, VectorClock};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::{Instant, timeout};

    fn settings(max_delay_ms: u64) -> LinkSettings {
        LinkSettings {
            max_delay: Duration::from_millis(max_delay_ms),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            queue: 16,
            max_line_length: 1024,
        }
    }

    fn message(clock: u64) -> Arc<Message> {
        Arc::new(Message::new(
            MessageId::new("A", clock),
            format!("m{clock}"),
            VectorClock::new(),
        ))
    }

    async fn wait_for_destinations(broker: &BrokerHandle, n: usize) {
        for _ in 0..200 {
            if broker.stats().await.unwrap().destinations == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("broker never reached {n} destinations");
    }

    /// A client endpoint used to inject and observe traffic.
    async fn attach_client(
        broker: &BrokerHandle,
    ) -> (mpsc::Sender<Arc<Message>>, mpsc::Receiver<Arc<Message>>) {
        let (tx, inbound) = mpsc::channel(16);
        let (outbound, rx) = mpsc::channel(16);
        broker
            .register(Registration::client(inbound, outbound))
            .await
            .unwrap();
        (tx, rx)
    }

    #[test]
    fn test_random_delay_bounds() {
        assert_eq!(random_delay(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(random_delay(Duration::from_millis(50)) <= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_outgoing_announces_and_streams() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = listener.local_addr().unwrap().to_string();
        let broker = BrokerHandle::spawn(16, 64);
        let (client_tx, _client_rx) = attach_client(&broker).await;

        let _link = spawn_outgoing(peer, broker.clone(), settings(0));
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        let role = timeout(Duration::from_secs(2), framed.next()).await.unwrap();
        assert_eq!(role.unwrap().unwrap(), "datacenter");

        wait_for_destinations(&broker, 2).await;
        client_tx.send(message(0)).await.unwrap();

        let mut framed = framed.map_codec(|_| WireCodec::new());
        let got = timeout(Duration::from_secs(2), framed.next()).await.unwrap();
        assert_eq!(got.unwrap().unwrap().id, MessageId::new("A", 0));
    }

    #[tokio::test]
    async fn test_delayed_messages_all_arrive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = listener.local_addr().unwrap().to_string();
        let broker = BrokerHandle::spawn(16, 64);
        let (client_tx, _client_rx) = attach_client(&broker).await;

        let _link = spawn_outgoing(peer, broker.clone(), settings(30));
        let (stream, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(stream, LineCodec::new());
        let role = timeout(Duration::from_secs(2), framed.next()).await.unwrap();
        assert_eq!(role.unwrap().unwrap(), "datacenter");
        let mut framed = framed.map_codec(|_| WireCodec::new());
        wait_for_destinations(&broker, 2).await;

        for clock in 0..10 {
            client_tx.send(message(clock)).await.unwrap();
        }

        let mut clocks = Vec::new();
        while clocks.len() < 10 {
            let got = timeout(Duration::from_secs(2), framed.next()).await.unwrap();
            clocks.push(got.unwrap().unwrap().id.clock);
        }
        clocks.sort_unstable();
        assert_eq!(clocks, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_run_concurrently() {
        let max_delay = Duration::from_secs(10);
        let (ready_tx, mut ready_rx) = mpsc::channel(16);
        let start = Instant::now();

        for clock in 0..10 {
            schedule_after(max_delay, message(clock), ready_tx.clone());
        }
        for _ in 0..10 {
            ready_rx.recv().await.unwrap();
        }

        // Ten timers at the maximum delay finish together, not one after another.
        let elapsed = start.elapsed();
        assert!(elapsed >= max_delay);
        assert!(elapsed < max_delay * 2, "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_pump_reports_why_it_ended() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // The broker dropping the endpoint is an eviction.
        let stream = TcpStream::connect(addr).await.unwrap();
        let (_accepted, _) = listener.accept().await.unwrap();
        let (outbound, deliveries) = mpsc::channel(4);
        drop(outbound);
        let error = pump(0, Framed::new(stream, WireCodec::new()), deliveries, &settings(0)).await;
        assert!(matches!(error, LinkError::Evicted));

        // The peer hanging up is a close.
        let stream = TcpStream::connect(addr).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        drop(accepted);
        let (_outbound, deliveries) = mpsc::channel(4);
        let error = pump(1, Framed::new(stream, WireCodec::new()), deliveries, &settings(0)).await;
        assert!(matches!(error, LinkError::PeerClosed));
    }

    #[tokio::test]
    async fn test_outgoing_redials_after_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer = listener.local_addr().unwrap().to_string();
        let broker = BrokerHandle::spawn(16, 64);

        let _link = spawn_outgoing(peer, broker.clone(), settings(0));
        let (first, _) = listener.accept().await.unwrap();
        drop(first);

        let second = timeout(Duration::from_secs(2), listener.accept()).await;
        assert!(second.is_ok(), "link never redialed");
    }

    #[tokio::test]
    async fn test_incoming_forwards_until_garbage() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broker = BrokerHandle::spawn(16, 64);
        let (_client_tx, mut client_rx) = attach_client(&broker).await;

        let mut remote = TcpStream::connect(addr).await.unwrap();
        let (accepted, peer_addr) = listener.accept().await.unwrap();
        let link = tokio::spawn(run_incoming(
            Framed::new(accepted, WireCodec::new()),
            broker.clone(),
            16,
            peer_addr,
        ));

        let line = format!("{}\n", message(4).to_json().unwrap());
        remote.write_all(line.as_bytes()).await.unwrap();
        let got = timeout(Duration::from_secs(2), client_rx.recv()).await.unwrap();
        assert_eq!(got.unwrap().id, MessageId::new("A", 4));

        remote.write_all(b"not json\n").await.unwrap();
        let result = timeout(Duration::from_secs(2), link).await.unwrap().unwrap();
        assert!(matches!(result, Err(LinkError::Protocol(_))));
    }
}
