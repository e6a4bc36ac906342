//! Dependency tagging of authored messages.

use relay_proto::{HostId, Message, MessageId, VectorClock};

/// Stamps authored messages with the author's causal context.
#[derive(Debug)]
pub struct DependencyTagger {
    host: HostId,
    next_clock: u64,
    observed: VectorClock,
}

impl DependencyTagger {
    pub fn new(host: HostId) -> Self {
        Self {
            host,
            next_clock: 0,
            observed: VectorClock::new(),
        }
    }

    /// Everything delivered to this client so far.
    pub fn state(&self) -> &VectorClock {
        &self.observed
    }

    /// Assign the next id to `body` and snapshot the observed state as its
    /// dependencies. The observed state itself only moves in [`observe`].
    ///
    /// [`observe`]: Self::observe
    pub fn tag(&mut self, body: impl Into<Vec<u8>>) -> Message {
        let id = MessageId::new(self.host.clone(), self.next_clock);
        self.next_clock += 1;
        Message::new(id, body, self.observed.clone())
    }

    /// Record that `delivered` was handed to the client.
    pub fn observe(&mut self, delivered: &Message) -> bool {
        self.observed.observe(&delivered.id)
    }
}
