//! Host id generation for client sessions.

use relay_proto::HostId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Generates unique origin host ids for the clients of one datacenter.
///
/// Format: `<node>.<n>` with `n` in lowercase base36, as long as it needs to
/// be. Example: "dc7001.2s" for the 101st client of node "dc7001".
///
/// The suffix never contains a `.`, so ids from different nodes cannot
/// collide as long as node names differ. The counter covers the whole `u64`
/// range.
#[derive(Debug)]
pub struct HostIdGenerator {
    node: String,
    counter: AtomicU64,
}

impl HostIdGenerator {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Generate the next unique host id.
    pub fn next(&self) -> HostId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        HostId::new(format!("{}.{}", self.node, to_base36(n)))
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    // u64::MAX needs 13 digits.
    let mut buf = [0u8; 13];
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = DIGITS[(n % 36) as usize];
        n /= 36;
        if n == 0 {
            break;
        }
    }
    buf[start..].iter().map(|&b| char::from(b)).collect()
}
