//! Broker - fan-in/fan-out hub between every attached endpoint.
//!
//! # Architecture
//!
//! - **State Ownership**: the dispatch actor owns the distribution list; nothing
//!   else can touch it.
//! - **Message Passing**: registrations and departures arrive as
//!   [`BrokerEvent`]s; traffic arrives on one aggregate stream fed by a
//!   consolidator task per inbound channel.
//! - **Routing**: every message goes to every other endpoint, except that
//!   traffic from a datacenter is never sent to another datacenter.
//! - **Back-pressure**: each destination has a forwarder task fed by a bounded
//!   send queue. A destination that lets its queue fill is evicted, so a
//!   stalled endpoint never holds up the rest.

mod dispatch;
mod registration;


pub use registration::{EndpointClass, EndpointId, Inbound, Outbound, Registration};

use dispatch::Dispatcher;
use relay_proto::Message;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Capacity of the control channel carrying joins and departures.
const CONTROL_CHANNEL_SIZE: usize = 64;

/// Events handled by the dispatch actor.
#[derive(Debug)]
pub(crate) enum BrokerEvent {
    /// A new endpoint wants to join the fan-out set.
    Joined {
        registration: Registration,
        reply_tx: oneshot::Sender<EndpointId>,
    },
    /// An endpoint is gone; drop it from the distribution list.
    Left(EndpointId),
    /// Request a snapshot of broker counters.
    Stats { reply_tx: oneshot::Sender<BrokerStats> },
}

/// A message on the aggregate stream, tagged with where it came from.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub origin: EndpointId,
    pub class: EndpointClass,
    pub message: Arc<Message>,
}

/// Broker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Endpoints currently on the distribution list.
    pub destinations: usize,
    /// Registrations accepted since start.
    pub registered: u64,
    /// Messages taken off the aggregate stream.
    pub dispatched: u64,
    /// Destinations dropped for overflowing their send queue.
    pub evicted: u64,
}

/// The broker's single logical actor went away.
#[derive(Debug, Clone, Copy, Error)]
#[error("broker is not running")]
pub struct BrokerClosed;

/// Cheap, cloneable handle to the broker.
///
/// The dispatch actor stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    events: mpsc::Sender<BrokerEvent>,
}

impl BrokerHandle {
    /// Spawn the dispatch actor.
    ///
    /// `send_queue` bounds how far any one destination may fall behind
    /// before it is evicted.
    pub fn spawn(aggregate_capacity: usize, send_queue: usize) -> Self {
        let (events, events_rx) = mpsc::channel(CONTROL_CHANNEL_SIZE);
        let (aggregate_tx, aggregate_rx) = mpsc::channel(aggregate_capacity);

        let dispatcher = Dispatcher::new(events.downgrade(), aggregate_tx, send_queue);
        tokio::spawn(async move {
            dispatcher.run(events_rx, aggregate_rx).await;
        });

        Self { events }
    }

    /// Join the fan-out set. Returns the id assigned to the endpoint.
    pub async fn register(&self, registration: Registration) -> Result<EndpointId, BrokerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(BrokerEvent::Joined {
                registration,
                reply_tx,
            })
            .await
            .map_err(|_| BrokerClosed)?;
        reply_rx.await.map_err(|_| BrokerClosed)
    }

    /// Leave the fan-out set.
    pub async fn deregister(&self, id: EndpointId) {
        let _ = self.events.send(BrokerEvent::Left(id)).await;
    }

    pub async fn stats(&self) -> Result<BrokerStats, BrokerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.events
            .send(BrokerEvent::Stats { reply_tx })
            .await
            .map_err(|_| BrokerClosed)?;
        reply_rx.await.map_err(|_| BrokerClosed)
    }
}
