//! Unified error handling for relayd.
//!
//! Errors here are always scoped to one session or one link: they end that
//! entity's tasks and are logged, never propagated to the broker or the
//! accept loop.

use relay_proto::ProtocolError;
use thiserror::Error;

// ============================================================================
// Session Errors (client connections)
// ============================================================================

/// Errors that end a client session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client disconnected during handshake")]
    HandshakeEof,

    #[error("failed to dial callback address {addr}: {source}")]
    CallbackDial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("broker is gone")]
    BrokerClosed,

    #[error("dropped by the broker")]
    Evicted,
}

impl SessionError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::HandshakeEof => "handshake_eof",
            Self::CallbackDial { .. } => "callback_dial",
            Self::Protocol(e) => e.error_code(),
            Self::BrokerClosed => "broker_closed",
            Self::Evicted => "evicted",
        }
    }
}

// ============================================================================
// Link Errors (datacenter connections)
// ============================================================================

/// Errors that end one datacenter link connection.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("dropped by the broker")]
    Evicted,

    #[error("broker is gone")]
    BrokerClosed,
}

impl LinkError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(e) => e.error_code(),
            Self::PeerClosed => "peer_closed",
            Self::Evicted => "evicted",
            Self::BrokerClosed => "broker_closed",
        }
    }
}
