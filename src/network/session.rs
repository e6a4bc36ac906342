//! ClientSession - one attached chat client.
//!
//! ```text
//!  client ──lines──▶ [reader] ──▶ [actor] ──▶ broker inbound
//!                                   ▲  │
//!               broker outbound ────┘  └──lines──▶ callback connection
//! ```
//!
//! The actor owns the session's [`DependencyTagger`] and [`DeliveryStager`].
//! Authored lines are tagged, handed to the broker and offered to the local
//! stager; the broker never sends a client's own messages back to it.
//!
//! The actor writes released bodies itself and observes each one only after
//! its write has been flushed, so a message that never reached the client is
//! never a dependency of what the client authors next.

use crate::broker::{BrokerHandle, Registration};
use crate::causal::{DeliveryStager, DependencyTagger};
use crate::error::SessionError;
use crate::metrics;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use futures_util::stream::SplitStream;
use relay_proto::{HostId, LineCodec, Message, ProtocolError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, FramedWrite};
use tracing::{debug, info, warn};

/// A client connection that has announced the `client` role.
pub struct ClientSession {
    host: HostId,
    addr: SocketAddr,
    broker: BrokerHandle,
    queue: usize,
    max_line_length: usize,
}

/// Tagger and stager of one session, with metric bookkeeping.
struct CausalState {
    tagger: DependencyTagger,
    stager: DeliveryStager,
}

impl CausalState {
    fn new(host: HostId) -> Self {
        Self {
            tagger: DependencyTagger::new(host),
            stager: DeliveryStager::new(),
        }
    }

    /// Offer `message` to the stager and return whatever it releases.
    fn offer(&mut self, message: Message) -> Vec<Message> {
        let pending_before = self.stager.pending_len();
        let duplicates_before = self.stager.duplicates();
        let id = message.id.clone();

        let released = self.stager.offer(message);

        let pending_after = self.stager.pending_len();
        metrics::adjust_pending(pending_after as i64 - pending_before as i64);
        metrics::record_duplicates(self.stager.duplicates() - duplicates_before);
        if pending_after > pending_before {
            metrics::record_staged();
            debug!(%id, pending = pending_after, "Staged message");
        }

        metrics::record_released(released.len());
        released
    }

    /// Write released messages to the client in order, observing each once
    /// it is flushed.
    async fn deliver<W>(
        &mut self,
        writer: &mut FramedWrite<W, LineCodec>,
        released: Vec<Message>,
    ) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        for mut message in released {
            let body = Bytes::from(std::mem::take(&mut message.body));
            writer.send(body).await?;
            self.tagger.observe(&message);
            debug!(id = %message.id, "Delivered message");
        }
        Ok(())
    }
}

impl Drop for CausalState {
    fn drop(&mut self) {
        metrics::adjust_pending(-(self.stager.pending_len() as i64));
    }
}

impl ClientSession {
    pub fn new(
        host: HostId,
        addr: SocketAddr,
        broker: BrokerHandle,
        queue: usize,
        max_line_length: usize,
    ) -> Self {
        Self {
            host,
            addr,
            broker,
            queue,
            max_line_length,
        }
    }

    /// Complete the handshake and relay until either connection or the
    /// broker goes away.
    ///
    /// `framed` has already had its role line consumed.
    pub async fn run(self, mut framed: Framed<TcpStream, LineCodec>) -> Result<(), SessionError> {
        let callback = match framed.next().await {
            Some(line) => line?,
            None => return Err(SessionError::HandshakeEof),
        };
        let callback = callback.trim().to_string();
        let callback_stream = TcpStream::connect(&callback).await.map_err(|source| {
            SessionError::CallbackDial {
                addr: callback.clone(),
                source,
            }
        })?;
        info!(host = %self.host, addr = %self.addr, %callback, "Client attached");

        let (inbound_tx, inbound) = mpsc::channel(self.queue);
        let (outbound, mut deliveries) = mpsc::channel(self.queue);
        let id = self
            .broker
            .register(Registration::client(inbound, outbound))
            .await
            .map_err(|_| SessionError::BrokerClosed)?;

        let (_, lines) = framed.split::<Bytes>();
        let (authored_tx, mut authored) = mpsc::channel(self.queue);
        let reader = tokio::spawn(read_lines(lines, authored_tx));

        let mut writer =
            FramedWrite::new(callback_stream, LineCodec::with_max_len(self.max_line_length));

        let mut state = CausalState::new(self.host.clone());
        let result = loop {
            let released = tokio::select! {
                line = authored.recv() => {
                    let Some(line) = line else {
                        break Ok(());
                    };
                    let message = state.tagger.tag(line.into_bytes());
                    metrics::record_authored();
                    debug!(id = %message.id, deps = %message.dependencies, "Authored message");

                    if inbound_tx.send(Arc::new(message.clone())).await.is_err() {
                        break Err(SessionError::BrokerClosed);
                    }
                    state.offer(message)
                }
                delivery = deliveries.recv() => {
                    let Some(message) = delivery else {
                        break Err(SessionError::Evicted);
                    };
                    state.offer(Arc::unwrap_or_clone(message))
                }
            };

            if let Err(e) = state.deliver(&mut writer, released).await {
                warn!(error = %e, code = e.error_code(), "Write to callback connection failed");
                break Ok(());
            }
        };

        self.broker.deregister(id).await;
        reader.abort();
        info!(
            host = %self.host,
            addr = %self.addr,
            delivered = %state.stager.delivered(),
            observed = state.tagger.state().len(),
            pending = state.stager.pending_len(),
            duplicates = state.stager.duplicates(),
            "Client detached"
        );
        result
    }
}

async fn read_lines(
    mut lines: SplitStream<Framed<TcpStream, LineCodec>>,
    authored: mpsc::Sender<String>,
) {
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                if authored.send(line).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Client read failed");
                return;
            }
        }
    }
    debug!("Client closed its connection");
}
