//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.ports must list at least one port")]
    NoPorts,
    #[error("server.ports contains port 0")]
    ZeroPort,
    #[error("server.ports lists {0} more than once")]
    DuplicatePort(u16),
    #[error("server.host is required")]
    MissingHost,
    #[error("server.name must not be empty")]
    EmptyName,
    #[error("limits.{0} must be greater than zero")]
    ZeroCapacity(&'static str),
    #[error("links.initial_backoff_ms must be greater than zero")]
    ZeroBackoff,
    #[error("links.max_backoff_ms ({max}) is below links.initial_backoff_ms ({initial})")]
    BackoffCapTooLow { initial: u64, max: u64 },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.ports.is_empty() {
        errors.push(ValidationError::NoPorts);
    }
    if config.server.ports.contains(&0) {
        errors.push(ValidationError::ZeroPort);
    }
    let mut seen = HashSet::new();
    for &port in &config.server.ports {
        if port != 0 && !seen.insert(port) {
            errors.push(ValidationError::DuplicatePort(port));
        }
    }
    if config.server.host.trim().is_empty() {
        errors.push(ValidationError::MissingHost);
    }
    if config.server.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        errors.push(ValidationError::EmptyName);
    }

    let limits = &config.limits;
    for (name, value) in [
        ("client_queue", limits.client_queue),
        ("datacenter_queue", limits.datacenter_queue),
        ("aggregate_queue", limits.aggregate_queue),
        ("send_queue", limits.send_queue),
        ("max_line_length", limits.max_line_length),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroCapacity(name));
        }
    }

    let links = &config.links;
    if links.initial_backoff_ms == 0 {
        errors.push(ValidationError::ZeroBackoff);
    }
    if links.max_backoff_ms < links.initial_backoff_ms {
        errors.push(ValidationError::BackoffCapTooLow {
            initial: links.initial_backoff_ms,
            max: links.max_backoff_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
