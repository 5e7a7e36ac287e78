//! HTTP endpoint for Prometheus scraping and liveness checks.
//!
//! Runs on its own tokio task: `GET /metrics` returns the text exposition
//! format, `GET /healthz` returns `ok`.

use axum::{Router, routing::get};
use std::net::SocketAddr;

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
}

/// Serve the metrics router on `0.0.0.0:port` until the process exits.
pub async fn run_http_server(port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics endpoint");
            return;
        }
    };
    tracing::info!(%addr, "Metrics endpoint listening");

    if let Err(e) = axum::serve(listener, router()).await {
        tracing::error!(error = %e, "Metrics endpoint failed");
    }
}
