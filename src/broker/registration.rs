//! Endpoint registrations.

use relay_proto::Message;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Broker-assigned endpoint id, unique and increasing for the broker's lifetime.
pub type EndpointId = u64;

/// Messages an endpoint hands to the broker.
pub type Inbound = mpsc::Receiver<Arc<Message>>;

/// Messages the broker hands to an endpoint.
pub type Outbound = mpsc::Sender<Arc<Message>>;

/// Which kind of connection an endpoint stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Client,
    Datacenter,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Datacenter => "datacenter",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One endpoint's channels. Either half may be absent for send-only or
/// receive-only endpoints.
#[derive(Debug)]
pub struct Registration {
    pub class: EndpointClass,
    pub inbound: Option<Inbound>,
    pub outbound: Option<Outbound>,
}

impl Registration {
    /// A client session: sends and receives.
    pub fn client(inbound: Inbound, outbound: Outbound) -> Self {
        Self {
            class: EndpointClass::Client,
            inbound: Some(inbound),
            outbound: Some(outbound),
        }
    }

    /// The sending side of a link to a peer datacenter.
    pub fn datacenter_outgoing(outbound: Outbound) -> Self {
        Self {
            class: EndpointClass::Datacenter,
            inbound: None,
            outbound: Some(outbound),
        }
    }

    /// The receiving side of a link from a peer datacenter.
    pub fn datacenter_incoming(inbound: Inbound) -> Self {
        Self {
            class: EndpointClass::Datacenter,
            inbound: Some(inbound),
            outbound: None,
        }
    }
}
