//! HTTP endpoint for Prometheus scraping and broker introspection.
//!
//! - `GET /metrics`: Prometheus text format
//! - `GET /stats`: broker counters as JSON

use crate::broker::{BrokerHandle, BrokerStats};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use std::net::SocketAddr;

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn stats_handler(
    State(broker): State<BrokerHandle>,
) -> Result<Json<BrokerStats>, StatusCode> {
    broker
        .stats()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

fn router(broker: BrokerHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(broker)
}

/// Serve the endpoint on `0.0.0.0:port` until the process exits.
///
/// A bind failure is logged and leaves the relay running without it.
pub async fn run_http_server(port: u16, broker: BrokerHandle) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };
    tracing::info!(%addr, "HTTP server listening");

    if let Err(e) = axum::serve(listener, router(broker)).await {
        tracing::error!(error = %e, "HTTP server error");
    }
}
