//! Standardized span constructors for relay observability.

pub mod spans {
    use tracing::{Span, info_span};

    /// Span for a client session.
    pub fn session(host: &str, addr: &str) -> Span {
        info_span!("session", host = %host, addr = %addr)
    }

    /// Span for a datacenter link; `direction` is "outgoing" or "incoming".
    pub fn link(peer: &str, direction: &'static str) -> Span {
        info_span!("link", peer = %peer, direction = direction)
    }

    /// Span for the accept loop.
    pub fn gateway(addr: &str) -> Span {
        info_span!("gateway", addr = %addr)
    }
}
