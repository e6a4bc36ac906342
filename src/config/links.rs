//! Datacenter link configuration.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{default_initial_backoff_ms, default_max_backoff_ms, default_max_delay_ms};

/// Timing of outgoing datacenter links.
#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    /// Upper bound of the random delay applied to each outgoing message.
    /// Zero disables the delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// First retry delay after a failed dial.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Cap on the retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl LinksConfig {
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            max_delay_ms: default_max_delay_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
