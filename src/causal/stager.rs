//! Staged delivery: hold messages until their dependencies are delivered.

use relay_proto::{Message, VectorClock};

/// Buffers messages whose dependencies are not yet delivered at this
/// destination and releases them, in dependency order, once they are.
///
/// Independent causal chains never block each other: the backlog is
/// rescanned to a fixed point after every release, so any message that
/// became deliverable is released regardless of arrival order.
#[derive(Debug, Default)]
pub struct DeliveryStager {
    delivered: VectorClock,
    pending: Vec<Message>,
    duplicates: u64,
}

impl DeliveryStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// What this destination has delivered so far.
    pub fn delivered(&self) -> &VectorClock {
        &self.delivered
    }

    /// Messages waiting on dependencies.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Messages dropped because they were already delivered or already staged.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Offer a newly received message.
    ///
    /// Returns every message released as a consequence, in the order they
    /// must be delivered. `msg` itself is either among them or staged.
    pub fn offer(&mut self, msg: Message) -> Vec<Message> {
        if self.is_duplicate(&msg) {
            self.duplicates += 1;
            return Vec::new();
        }

        let mut released = Vec::new();
        if self.delivered.satisfies(&msg.dependencies) {
            self.delivered.observe(&msg.id);
            released.push(msg);
            self.drain_ready(&mut released);
        } else {
            self.pending.push(msg);
        }
        released
    }

    fn is_duplicate(&self, msg: &Message) -> bool {
        self.delivered.covers(&msg.id) || self.pending.iter().any(|p| p.id == msg.id)
    }

    /// Rescan the backlog until a pass releases nothing.
    fn drain_ready(&mut self, released: &mut Vec<Message>) {
        loop {
            let mut progress = false;
            let mut still_pending = Vec::with_capacity(self.pending.len());

            for msg in std::mem::take(&mut self.pending) {
                if self.delivered.covers(&msg.id) {
                    self.duplicates += 1;
                } else if self.delivered.satisfies(&msg.dependencies) {
                    self.delivered.observe(&msg.id);
                    released.push(msg);
                    progress = true;
                } else {
                    still_pending.push(msg);
                }
            }

            self.pending = still_pending;
            if !progress {
                break;
            }
        }
    }
}
