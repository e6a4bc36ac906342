//! Vector clocks for causal delivery.
//!
//! - `HostId`: the origin of a message (one authoring client).
//! - `MessageId`: an origin host plus its per-host sequence number.
//! - `VectorClock`: the highest clock delivered per host, as held by one observer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifies the client that authored a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Create a host id from any string.
    pub fn new(host: impl Into<String>) -> Self {
        Self(host.into())
    }

    /// Get the inner host string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(host: &str) -> Self {
        Self::new(host)
    }
}

impl From<String> for HostId {
    fn from(host: String) -> Self {
        Self(host)
    }
}

/// Unique, immutable identity of an authored message.
///
/// `clock` starts at 0 for a host's first message and increases by one for
/// every message that host authors afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    /// Authoring host.
    #[serde(rename = "Host")]
    pub host: HostId,
    /// Per-host sequence number.
    #[serde(rename = "Clock")]
    pub clock: u64,
}

impl MessageId {
    /// Create a message id.
    pub fn new(host: impl Into<HostId>, clock: u64) -> Self {
        Self {
            host: host.into(),
            clock,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.host, self.clock)
    }
}

/// Everything an observer has delivered so far: one clock per origin host.
///
/// A missing host means nothing from that host has been delivered, which is
/// different from an entry of `0` (the host's first message was delivered).
/// Entries never decrease.
///
/// On the wire a clock is a list of `{Host, Clock}` objects sorted by host.
/// A `null` list decodes as the empty clock and repeated hosts collapse to
/// their highest clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<MessageId>>", into = "Vec<MessageId>")]
pub struct VectorClock {
    entries: HashMap<HostId, u64>,
}

impl VectorClock {
    /// Create a new empty vector clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest delivered clock for `host`, if any.
    #[must_use]
    pub fn get(&self, host: &HostId) -> Option<u64> {
        self.entries.get(host).copied()
    }

    /// Number of hosts with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record delivery of `id`.
    ///
    /// Returns `true` if the entry for `id.host` advanced. A clock lower than
    /// or equal to the stored one is a no-op.
    pub fn observe(&mut self, id: &MessageId) -> bool {
        match self.entries.get_mut(&id.host) {
            Some(current) if *current >= id.clock => false,
            Some(current) => {
                *current = id.clock;
                true
            }
            None => {
                self.entries.insert(id.host.clone(), id.clock);
                true
            }
        }
    }

    /// Update to include everything delivered according to `other`.
    pub fn merge(&mut self, other: &Self) {
        for (host, &clock) in &other.entries {
            let entry = self.entries.entry(host.clone()).or_insert(clock);
            *entry = (*entry).max(clock);
        }
    }

    /// True if `id` (or something later from the same host) was delivered.
    #[must_use]
    pub fn covers(&self, id: &MessageId) -> bool {
        self.get(&id.host).is_some_and(|clock| clock >= id.clock)
    }

    /// Causal-satisfaction predicate, with `self` as the delivered state.
    ///
    /// True iff every `(host, clock)` in `deps` has been delivered here at or
    /// beyond `clock`. An empty dependency set is always satisfied.
    #[must_use]
    pub fn satisfies(&self, deps: &VectorClock) -> bool {
        deps.entries
            .iter()
            .all(|(host, &clock)| self.get(host).is_some_and(|seen| seen >= clock))
    }

    /// Entries as message ids, sorted by host.
    #[must_use]
    pub fn to_ids(&self) -> Vec<MessageId> {
        let mut ids: Vec<MessageId> = self
            .entries
            .iter()
            .map(|(host, &clock)| MessageId::new(host.clone(), clock))
            .collect();
        ids.sort_by(|a, b| a.host.cmp(&b.host));
        ids
    }
}

impl FromIterator<MessageId> for VectorClock {
    fn from_iter<I: IntoIterator<Item = MessageId>>(iter: I) -> Self {
        let mut clock = Self::new();
        for id in iter {
            clock.observe(&id);
        }
        clock
    }
}

impl From<Option<Vec<MessageId>>> for VectorClock {
    fn from(ids: Option<Vec<MessageId>>) -> Self {
        ids.unwrap_or_default().into_iter().collect()
    }
}

impl From<VectorClock> for Vec<MessageId> {
    fn from(clock: VectorClock) -> Self {
        clock.to_ids()
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, id) in self.to_ids().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}", id.host, id.clock)?;
        }
        f.write_str("}")
    }
}
