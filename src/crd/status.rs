//! # AzureKeyVaultSecret Status
//!
//! Status fields owned by the controller. The secret group and the config map group
//! are written by independent passes and never overwrite each other.

use serde::{Deserialize, Serialize};

/// Status of the AzureKeyVaultSecret resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultSecretStatus {
    /// Name of the Secret last written from Key Vault
    #[serde(default)]
    pub secret_name: Option<String>,
    /// Content digest of the Secret data last written
    #[serde(default)]
    pub secret_hash: Option<String>,
    /// Name of the ConfigMap last written from Key Vault
    #[serde(default)]
    pub config_map_name: Option<String>,
    /// Content digest of the ConfigMap data last written
    #[serde(default)]
    pub config_map_hash: Option<String>,
    /// Last time an output was updated from Key Vault (RFC3339)
    #[serde(default)]
    pub last_azure_update: Option<String>,
}
