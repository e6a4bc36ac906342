//! The dispatch actor, its consolidators and per-destination forwarders.

use super::{BrokerEvent, BrokerStats, EndpointClass, EndpointId, Envelope, Inbound, Outbound};
use relay_proto::Message;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// An entry on the distribution list.
///
/// `send_queue` feeds the destination's forwarder task, which is the only
/// thing that ever waits on the destination's own channel.
#[derive(Debug)]
struct Destination {
    id: EndpointId,
    class: EndpointClass,
    send_queue: mpsc::Sender<Arc<Message>>,
}

/// Owns the distribution list and routes the aggregate stream over it.
pub(super) struct Dispatcher {
    events: mpsc::WeakSender<BrokerEvent>,
    aggregate_tx: mpsc::Sender<Envelope>,
    destinations: Vec<Destination>,
    send_queue: usize,
    next_id: EndpointId,
    dispatched: u64,
    evicted: u64,
}

/// Routing policy: never back to the sender, never datacenter to datacenter.
pub(super) fn routes_to(
    origin: EndpointId,
    origin_class: EndpointClass,
    dest: EndpointId,
    dest_class: EndpointClass,
) -> bool {
    if origin == dest {
        return false;
    }
    !(origin_class == EndpointClass::Datacenter && dest_class == EndpointClass::Datacenter)
}

impl Dispatcher {
    pub(super) fn new(
        events: mpsc::WeakSender<BrokerEvent>,
        aggregate_tx: mpsc::Sender<Envelope>,
        send_queue: usize,
    ) -> Self {
        Self {
            events,
            aggregate_tx,
            destinations: Vec::new(),
            send_queue,
            next_id: 0,
            dispatched: 0,
            evicted: 0,
        }
    }

    /// The main actor loop. Ends when every broker handle is gone.
    pub(super) async fn run(
        mut self,
        mut events: mpsc::Receiver<BrokerEvent>,
        mut aggregate: mpsc::Receiver<Envelope>,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(envelope) = aggregate.recv() => self.dispatch(envelope),
            }
        }
        debug!(dispatched = self.dispatched, evicted = self.evicted, "Broker stopped");
    }

    fn handle_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Joined {
                registration,
                reply_tx,
            } => {
                let id = self.next_id;
                self.next_id += 1;
                let class = registration.class;

                if let Some(inbound) = registration.inbound {
                    let aggregate = self.aggregate_tx.clone();
                    tokio::spawn(consolidate(inbound, aggregate, id, class));
                }
                if let Some(outbound) = registration.outbound {
                    let (send_queue, backlog) = mpsc::channel(self.send_queue);
                    tokio::spawn(forward(id, backlog, outbound, self.events.clone()));
                    self.destinations.push(Destination {
                        id,
                        class,
                        send_queue,
                    });
                }
                crate::metrics::set_endpoints(self.destinations.len());
                info!(endpoint = id, %class, "Endpoint joined");

                // A requester that gave up waiting simply never learns its id.
                let _ = reply_tx.send(id);
            }
            BrokerEvent::Left(id) => self.prune(&[id]),
            BrokerEvent::Stats { reply_tx } => {
                let _ = reply_tx.send(BrokerStats {
                    destinations: self.destinations.len(),
                    registered: self.next_id,
                    dispatched: self.dispatched,
                    evicted: self.evicted,
                });
            }
        }
    }

    fn dispatch(&mut self, envelope: Envelope) {
        self.dispatched += 1;
        let mut recipients = 0usize;
        let mut gone = Vec::new();

        for dest in &self.destinations {
            if !routes_to(envelope.origin, envelope.class, dest.id, dest.class) {
                continue;
            }
            match dest.send_queue.try_send(Arc::clone(&envelope.message)) {
                Ok(()) => recipients += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        endpoint = dest.id,
                        class = %dest.class,
                        "Send queue exceeded, evicting endpoint"
                    );
                    crate::metrics::record_eviction();
                    self.evicted += 1;
                    gone.push(dest.id);
                }
                Err(TrySendError::Closed(_)) => gone.push(dest.id),
            }
        }

        debug!(
            id = %envelope.message.id,
            origin = envelope.origin,
            class = %envelope.class,
            recipients,
            "Dispatched message"
        );
        crate::metrics::record_dispatch(recipients);

        if !gone.is_empty() {
            self.prune(&gone);
        }
    }

    /// Drop destinations. Their forwarders drain what is queued and then
    /// close the endpoint's channel.
    fn prune(&mut self, ids: &[EndpointId]) {
        let before = self.destinations.len();
        self.destinations.retain(|dest| !ids.contains(&dest.id));
        if self.destinations.len() != before {
            crate::metrics::set_endpoints(self.destinations.len());
            for id in ids {
                info!(endpoint = id, "Endpoint left");
            }
        }
    }
}

/// Forward one endpoint's inbound channel onto the aggregate stream.
async fn consolidate(
    mut inbound: Inbound,
    aggregate: mpsc::Sender<Envelope>,
    origin: EndpointId,
    class: EndpointClass,
) {
    while let Some(message) = inbound.recv().await {
        let envelope = Envelope {
            origin,
            class,
            message,
        };
        if aggregate.send(envelope).await.is_err() {
            break;
        }
    }
    debug!(endpoint = origin, "Consolidator ended");
}

/// Move one destination's backlog into its channel, in order.
///
/// Blocks only on this destination. When the endpoint goes away first, the
/// broker is told so the destination is pruned without waiting for traffic.
async fn forward(
    id: EndpointId,
    mut backlog: mpsc::Receiver<Arc<Message>>,
    outbound: Outbound,
    events: mpsc::WeakSender<BrokerEvent>,
) {
    loop {
        tokio::select! {
            next = backlog.recv() => match next {
                Some(message) => {
                    if outbound.send(message).await.is_err() {
                        break;
                    }
                }
                None => return,
            },
            _ = outbound.closed() => break,
        }
    }

    debug!(endpoint = id, "Destination closed");
    if let Some(events) = events.upgrade() {
        let _ = events.send(BrokerEvent::Left(id)).await;
    }
}
