//! Connection roles announced on the first line of every connection.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// What the remote side of a freshly accepted connection is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A chat client; its next line is its callback address.
    Client,
    /// A peer datacenter's outgoing link.
    Datacenter,
}

impl Role {
    /// The handshake line for this role, without terminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Datacenter => "datacenter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "client" => Ok(Self::Client),
            "datacenter" => Ok(Self::Datacenter),
            other => Err(ProtocolError::UnknownRole(other.to_string())),
        }
    }
}
