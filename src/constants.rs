//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Name reported as the event source and field manager
pub const CONTROLLER_NAME: &str = "keyvault-secret-controller";

/// Default HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default interval at which every cached resource is re-checked against Key Vault (seconds)
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 30;

/// Default number of workers draining the structural queue
pub const DEFAULT_STRUCTURAL_WORKERS: usize = 1;

/// Default number of workers draining the vault-drift queue
pub const DEFAULT_VAULT_WORKERS: usize = 1;

/// Default number of rate-limited requeues before a key is dropped until the next resync
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default per-key backoff starting value (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 5;

/// Default per-key backoff maximum value (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 1000;

/// Attempts made by the status persister when the API server reports a write conflict
pub const STATUS_UPDATE_ATTEMPTS: usize = 5;

/// Secret type used when the output does not name one
pub const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Secret type whose data is split into `tls.crt` / `tls.key`
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";

/// Secret type whose data lives under `.dockerconfigjson`
pub const SECRET_TYPE_DOCKER_CONFIG_JSON: &str = "kubernetes.io/dockerconfigjson";

/// Data keys of a `kubernetes.io/tls` secret
pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Data key of a `kubernetes.io/dockerconfigjson` secret
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Content types Key Vault reports for certificate-backed secrets
pub const CONTENT_TYPE_PEM: &str = "application/x-pem-file";
pub const CONTENT_TYPE_PKCS12: &str = "application/x-pkcs12";

/// Content types accepted for multi-key secrets
pub const CONTENT_TYPE_JSON: &str = "application/x-json";
pub const CONTENT_TYPE_YAML: &str = "application/x-yaml";

/// Queue names, used as metric labels and span fields
pub const STRUCTURAL_QUEUE: &str = "structural";
pub const VAULT_QUEUE: &str = "vault-drift";

/// Label put on every output object, also the selector of the output watches
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
