//! # Initialization
//!
//! Process setup: rustls crypto provider, tracing subscriber, metrics registry and the
//! health and metrics server.

use crate::config::ControllerConfig;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Install ring as the rustls crypto provider
///
/// Must run before the first TLS connection (Kubernetes API or Key Vault).
pub fn install_crypto_provider() {
    // Err means a provider is already installed, which is fine
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Filter from `RUST_LOG`, falling back to the configured log level for this crate
fn env_filter(config: &ControllerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.to_lowercase();
        EnvFilter::new(format!("warn,keyvault_secret_controller={level}"))
    })
}

/// Install the global tracing subscriber (`LOG_FORMAT=json|text`)
///
/// # Errors
/// A global subscriber is already installed
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));
    let result = if config.log_format.eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

/// Register metrics and start the HTTP server in the background
///
/// # Errors
/// Metric registration fails
pub fn start_observability(config: &ControllerConfig) -> Result<Arc<ServerState>> {
    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let state = Arc::clone(&server_state);
    let port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!(port, "Metrics and health server started");
    Ok(server_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_crypto_provider_is_idempotent() {
        install_crypto_provider();
        install_crypto_provider();
    }
}
