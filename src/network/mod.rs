//! Network module.
//!
//! Contains the Gateway (TCP listener) and the client session handler.

mod gateway;
mod session;

pub use gateway::Gateway;
pub use session::ClientSession;
