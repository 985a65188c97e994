//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// How often every cached resource is re-checked against Key Vault (seconds)
    pub resync_period_secs: u64,
    /// Workers draining the structural queue
    pub structural_workers: usize,
    /// Workers draining the vault-drift queue
    pub vault_workers: usize,
    /// Rate-limited requeues before a failing key is dropped until the next resync
    pub max_retries: u32,
    /// Per-key backoff starting value (milliseconds)
    pub backoff_base_ms: u64,
    /// Per-key backoff maximum value (seconds)
    pub backoff_max_secs: u64,
    /// HTTP port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE), used when `RUST_LOG` is unset
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            watch_namespace: None,
            resync_period_secs: DEFAULT_RESYNC_PERIOD_SECS,
            structural_workers: DEFAULT_STRUCTURAL_WORKERS,
            vault_workers: DEFAULT_VAULT_WORKERS,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            watch_namespace: std::env::var("WATCH_NAMESPACE")
                .ok()
                .filter(|ns| !ns.trim().is_empty()),
            resync_period_secs: env_var_or_default(
                "RESYNC_PERIOD_SECS",
                DEFAULT_RESYNC_PERIOD_SECS,
            ),
            structural_workers: env_var_or_default(
                "STRUCTURAL_WORKERS",
                DEFAULT_STRUCTURAL_WORKERS,
            ),
            vault_workers: env_var_or_default("VAULT_WORKERS", DEFAULT_VAULT_WORKERS),
            max_retries: env_var_or_default("MAX_RETRIES", DEFAULT_MAX_RETRIES),
            backoff_base_ms: env_var_or_default("BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get resync period duration
    #[must_use]
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs.max(1))
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
