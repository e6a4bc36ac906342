//! Prometheus metrics collection for relayd.
//!
//! Exposed on an HTTP endpoint when `server.metrics_port` is set.
//!
//! - `relay_messages_authored_total` - Messages tagged for local clients
//! - `relay_messages_dispatched_total` - Messages taken off the broker's aggregate stream
//! - `relay_messages_released_total` - Messages handed to client sockets
//! - `relay_messages_staged_total` - Messages that had to wait for dependencies
//! - `relay_duplicates_dropped_total` - Redelivered messages discarded by stagers
//! - `relay_evictions_total` - Endpoints dropped for overflowing their send queue
//! - `relay_endpoints` - Endpoints on the broker's distribution list (gauge)
//! - `relay_pending_messages` - Messages staged across all sessions (gauge)
//! - `relay_fanout` - Recipients per dispatched message (histogram)

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

pub static MESSAGES_AUTHORED: OnceLock<IntCounter> = OnceLock::new();

pub static MESSAGES_DISPATCHED: OnceLock<IntCounter> = OnceLock::new();

pub static MESSAGES_RELEASED: OnceLock<IntCounter> = OnceLock::new();

pub static MESSAGES_STAGED: OnceLock<IntCounter> = OnceLock::new();

pub static DUPLICATES_DROPPED: OnceLock<IntCounter> = OnceLock::new();

pub static EVICTIONS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

pub static ENDPOINTS: OnceLock<IntGauge> = OnceLock::new();

pub static PENDING_MESSAGES: OnceLock<IntGauge> = OnceLock::new();

/// Recipients per dispatched message.
pub static FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup. Recording before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(
                            error = %e,
                            concat!("Failed to register metric ", stringify!($metric))
                        );
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        concat!("Failed to create metric ", stringify!($metric))
                    );
                }
            }
        };
    }

    register!(
        MESSAGES_AUTHORED,
        IntCounter::new("relay_messages_authored_total", "Messages authored by local clients")
    );
    register!(
        MESSAGES_DISPATCHED,
        IntCounter::new("relay_messages_dispatched_total", "Messages dispatched by the broker")
    );
    register!(
        MESSAGES_RELEASED,
        IntCounter::new("relay_messages_released_total", "Messages released to clients")
    );
    register!(
        MESSAGES_STAGED,
        IntCounter::new("relay_messages_staged_total", "Messages held back for dependencies")
    );
    register!(
        DUPLICATES_DROPPED,
        IntCounter::new("relay_duplicates_dropped_total", "Duplicate messages discarded")
    );
    register!(
        EVICTIONS,
        IntCounter::new("relay_evictions_total", "Endpoints evicted for a full send queue")
    );
    register!(
        ENDPOINTS,
        IntGauge::new("relay_endpoints", "Endpoints on the distribution list")
    );
    register!(
        PENDING_MESSAGES,
        IntGauge::new("relay_pending_messages", "Messages waiting on dependencies")
    );
    register!(
        FANOUT,
        Histogram::with_opts(
            HistogramOpts::new("relay_fanout", "Recipients per dispatched message")
                .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

#[inline]
fn inc_by(metric: &OnceLock<IntCounter>, n: u64) {
    if let Some(c) = metric.get() {
        c.inc_by(n);
    }
}

#[inline]
pub fn record_authored() {
    inc_by(&MESSAGES_AUTHORED, 1);
}

/// Record one broker dispatch and its fan-out.
#[inline]
pub fn record_dispatch(recipients: usize) {
    inc_by(&MESSAGES_DISPATCHED, 1);
    if let Some(h) = FANOUT.get() {
        h.observe(recipients as f64);
    }
}

#[inline]
pub fn record_released(count: usize) {
    inc_by(&MESSAGES_RELEASED, count as u64);
}

#[inline]
pub fn record_staged() {
    inc_by(&MESSAGES_STAGED, 1);
}

#[inline]
pub fn record_duplicates(count: u64) {
    inc_by(&DUPLICATES_DROPPED, count);
}

#[inline]
pub fn record_eviction() {
    inc_by(&EVICTIONS, 1);
}

#[inline]
pub fn set_endpoints(count: usize) {
    if let Some(g) = ENDPOINTS.get() {
        g.set(count as i64);
    }
}

/// Adjust the staged-message gauge by a session's change in backlog.
#[inline]
pub fn adjust_pending(delta: i64) {
    if let Some(g) = PENDING_MESSAGES.get() {
        g.add(delta);
    }
}
