//! # Key Vault Secret Controller
//!
//! A Kubernetes controller that syncs Azure Key Vault objects into Kubernetes Secrets and
//! ConfigMaps.
//!
//! ## Overview
//!
//! 1. **Watching `AzureKeyVaultSecret` resources** across all namespaces (or one, with `--namespace`)
//! 2. **Creating owned outputs** - a Secret and/or ConfigMap per resource
//! 3. **Polling Key Vault** every resync period and rewriting outputs only when the content digest changes
//!
//! Health checks and Prometheus metrics are served on `METRICS_PORT` (default 5000).

use anyhow::{Context, Result};
use clap::Parser;
use keyvault_secret_controller::cli::Cli;
use keyvault_secret_controller::config::ControllerConfig;
use keyvault_secret_controller::provider::azure::AzureKeyVaultService;
use keyvault_secret_controller::runtime::{self, initialization};
use kube::Client;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ControllerConfig::from_env();
    cli.apply(&mut config);

    initialization::install_crypto_provider();
    initialization::init_tracing(&config)?;

    info!("Starting Key Vault Secret Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        structural_workers = config.structural_workers,
        vault_workers = config.vault_workers,
        resync_period_secs = config.resync_period_secs,
        max_retries = config.max_retries,
        "Controller configuration"
    );

    let server_state = initialization::start_observability(&config)?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let vault = Arc::new(AzureKeyVaultService::new()?);

    runtime::run(client, vault, &config, server_state).await
}
