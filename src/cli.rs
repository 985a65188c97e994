//! # Command Line
//!
//! Flags for the controller binary. Every flag is optional and, when given, overrides the
//! value loaded from the environment.
//!
//! ```bash
//! keyvault-secret-controller --namespace apps --vault-workers 4 --resync-period-secs 60
//! ```

use crate::config::ControllerConfig;
use clap::Parser;

/// Azure Key Vault to Kubernetes Secret/ConfigMap controller
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "keyvault-secret-controller", version, about, long_about = None)]
pub struct Cli {
    /// Only watch AzureKeyVaultSecret resources in this namespace
    #[arg(long)]
    pub namespace: Option<String>,

    /// Workers draining the structural queue
    #[arg(long)]
    pub structural_workers: Option<usize>,

    /// Workers draining the vault-drift queue
    #[arg(long)]
    pub vault_workers: Option<usize>,

    /// Seconds between Key Vault re-checks of every resource
    #[arg(long)]
    pub resync_period_secs: Option<u64>,

    /// Port for /metrics, /healthz and /readyz
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

impl Cli {
    /// Override `config` with the flags that were given
    pub fn apply(self, config: &mut ControllerConfig) {
        if let Some(namespace) = self.namespace.filter(|ns| !ns.trim().is_empty()) {
            config.watch_namespace = Some(namespace);
        }
        if let Some(workers) = self.structural_workers {
            config.structural_workers = workers;
        }
        if let Some(workers) = self.vault_workers {
            config.vault_workers = workers;
        }
        if let Some(secs) = self.resync_period_secs {
            config.resync_period_secs = secs;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = port;
        }
    }
}
