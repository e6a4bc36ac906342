//! Integration test common infrastructure.
//!
//! Provides utilities for spawning relayd processes and attaching test
//! clients that speak the client handshake.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::{TestMesh, TestServer, free_ports};
