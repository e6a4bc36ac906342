//! # relay-proto
//!
//! Message model and wire formats for the relayd causal-broadcast relay.
//!
//! ## Features
//!
//! - Vector clocks with a causal-satisfaction predicate
//! - Messages tagged with the dependencies their author had observed
//! - Newline-delimited line codec for the client protocol
//! - Newline-delimited JSON codec for datacenter-to-datacenter links
//!
//! ## Quick Start
//!
//! ```rust
//! use relay_proto::{Message, MessageId, VectorClock};
//!
//! let hello = Message::new(MessageId::new("A", 0), "hello", VectorClock::new());
//!
//! let mut seen = VectorClock::new();
//! seen.observe(&hello.id);
//! let world = Message::new(MessageId::new("A", 1), "world", seen.clone());
//!
//! let mut delivered = VectorClock::new();
//! assert!(!delivered.satisfies(&world.dependencies));
//! delivered.observe(&hello.id);
//! assert!(delivered.satisfies(&world.dependencies));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod clock;
pub mod codec;
pub mod error;
pub mod line;
pub mod message;
pub mod role;

pub use clock::{HostId, MessageId, VectorClock};
pub use codec::WireCodec;
pub use error::{ProtocolError, Result};
pub use line::LineCodec;
pub use message::Message;
pub use role::Role;
