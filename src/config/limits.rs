//! Channel capacities and framing limits.

use serde::Deserialize;

use super::defaults::{
    default_aggregate_queue, default_client_queue, default_datacenter_queue,
    default_max_line_length, default_send_queue,
};

/// Bounded-buffer sizes. Every channel between tasks is bounded by one of
/// these. A full channel blocks its sender, except a broker send queue,
/// which evicts its destination instead.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Capacity of each client session's inbound and outbound queues.
    #[serde(default = "default_client_queue")]
    pub client_queue: usize,
    /// Capacity of each datacenter link's queues.
    #[serde(default = "default_datacenter_queue")]
    pub datacenter_queue: usize,
    /// Capacity of the broker's aggregate stream.
    #[serde(default = "default_aggregate_queue")]
    pub aggregate_queue: usize,
    /// Messages the broker holds for one destination before evicting it.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
    /// Longest accepted line, in bytes, on any connection.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            client_queue: default_client_queue(),
            datacenter_queue: default_datacenter_queue(),
            aggregate_queue: default_aggregate_queue(),
            send_queue: default_send_queue(),
            max_line_length: default_max_line_length(),
        }
    }
}
