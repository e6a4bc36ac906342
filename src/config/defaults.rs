//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

pub fn default_host() -> String {
    "localhost".to_string()
}

// =============================================================================
// Limits Defaults
// =============================================================================

pub fn default_client_queue() -> usize {
    4
}

pub fn default_datacenter_queue() -> usize {
    100
}

pub fn default_aggregate_queue() -> usize {
    100
}

pub fn default_send_queue() -> usize {
    1024
}

pub fn default_max_line_length() -> usize {
    relay_proto::line::DEFAULT_MAX_LINE
}

// =============================================================================
// Link Defaults
// =============================================================================

pub fn default_max_delay_ms() -> u64 {
    10_000
}

pub fn default_initial_backoff_ms() -> u64 {
    1_000
}

pub fn default_max_backoff_ms() -> u64 {
    64_000
}
