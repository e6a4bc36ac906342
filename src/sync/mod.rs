//! Datacenter-to-datacenter replication links.

mod backoff;
mod link;

pub use link::{LinkSettings, run_incoming, spawn_outgoing};
