//! chato - chat relay daemon.
//!
//! Loads the configuration, bootstraps the history backend, and serves the
//! JSON-lines gateway until interrupted.

use chato::config::{Config, validation};
use chato::network::Gateway;
use chato::relay::Relay;
use chato::{history, http, metrics};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        server = %config.server.name,
        backend = config.history.backend.as_str(),
        "Starting chato"
    );

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(http::run_http_server(metrics_port));
    }

    // Bootstrap the history backend; failure here is fatal.
    let store = history::open(&config.history).await.map_err(|e| {
        error!(error = %e, "History backend bootstrap failed");
        e
    })?;

    let relay = Arc::new(Relay::new(store, &config.history));
    let gateway = Gateway::bind(&config.listen, relay).await?;

    tokio::select! {
        result = gateway.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}
