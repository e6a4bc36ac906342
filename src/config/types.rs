//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::default_host;
use super::limits::LimitsConfig;
use super::links::LinksConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid port argument: {0:?}")]
    InvalidPort(String),
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listener and datacenter identity.
    pub server: ServerConfig,
    /// Queue capacities and line limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Datacenter link timing.
    #[serde(default)]
    pub links: LinksConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host the listener binds on and every peer datacenter is reached at.
    #[serde(default = "default_host")]
    pub host: String,
    /// Candidate listening ports, tried in order. Every port other than the
    /// one bound is a peer datacenter.
    pub ports: Vec<u16>,
    /// Datacenter name used as the prefix of client host ids.
    /// Defaults to `dc<bound port>`.
    #[serde(default)]
    pub name: Option<String>,
    /// Prometheus metrics HTTP port (absent or 0 disables the endpoint).
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Build a configuration from a bare list of port arguments.
    pub fn from_ports<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let ports = args
            .iter()
            .map(|arg| {
                let arg = arg.as_ref();
                arg.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(arg.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            server: ServerConfig {
                host: default_host(),
                ports,
                name: None,
                metrics_port: None,
            },
            limits: LimitsConfig::default(),
            links: LinksConfig::default(),
        })
    }

    /// Addresses of every peer datacenter, given the port this node bound.
    pub fn peer_addresses(&self, local_port: u16) -> Vec<String> {
        self.server
            .ports
            .iter()
            .filter(|&&port| port != local_port)
            .map(|port| format!("{}:{}", self.server.host, port))
            .collect()
    }

    /// Name of this datacenter once it has bound `local_port`.
    pub fn node_name(&self, local_port: u16) -> String {
        self.server
            .name
            .clone()
            .unwrap_or_else(|| format!("dc{local_port}"))
    }
}
