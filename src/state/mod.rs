//! Runtime state owned outside the actors.

mod host;

pub use host::HostIdGenerator;
