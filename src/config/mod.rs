//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig)
//! - [`limits`]: Channel capacities and line limits (LimitsConfig)
//! - [`links`]: Datacenter link timing (LinksConfig)
//! - [`validation`]: Startup validation

mod defaults;
mod limits;
mod links;
mod types;
pub mod validation;

pub use types::Config;
