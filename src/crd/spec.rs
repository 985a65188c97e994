//! # AzureKeyVaultSecret Spec
//!
//! Main CRD specification types.

use serde::{Deserialize, Serialize};

/// AzureKeyVaultSecret Custom Resource Definition
///
/// Declares that one Azure Key Vault object should be projected into a Kubernetes
/// Secret, a ConfigMap, or both.
///
/// # Example
///
/// ```yaml
/// apiVersion: spv.no/v2alpha1
/// kind: AzureKeyVaultSecret
/// metadata:
///   name: db-password
///   namespace: default
/// spec:
///   vault:
///     name: my-vault
///     object:
///       name: db-password
///       type: secret
///   output:
///     secret:
///       name: db-password
///       dataKey: password
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AzureKeyVaultSecret",
    group = "spv.no",
    version = "v2alpha1",
    namespaced,
    status = "crate::crd::AzureKeyVaultSecretStatus",
    shortname = "akvs",
    printcolumn = r#"{"name":"Vault", "type":"string", "jsonPath":".spec.vault.name"}, {"name":"Vault Object", "type":"string", "jsonPath":".spec.vault.object.name"}, {"name":"Secret Name", "type":"string", "jsonPath":".status.secretName"}, {"name":"ConfigMap Name", "type":"string", "jsonPath":".status.configMapName"}, {"name":"Last Update", "type":"date", "jsonPath":".status.lastAzureUpdate"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultSecretSpec {
    /// The Key Vault object to read
    pub vault: AzureKeyVault,
    /// Where to write the object; a resource without any output is ignored
    #[serde(default)]
    pub output: AzureKeyVaultOutput,
}

/// Key Vault reference
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVault {
    /// Key Vault name (`my-vault`) or full vault URL (`https://my-vault.vault.azure.net/`)
    pub name: String,
    /// Object inside the vault
    pub object: AzureKeyVaultObject,
}

/// Object inside a Key Vault
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultObject {
    /// Object name
    pub name: String,
    /// Object type: `secret`, `certificate`, `key` or `multi-key-value-secret`
    #[serde(rename = "type")]
    pub object_type: String,
    /// Object version (latest when not set)
    #[serde(default)]
    pub version: Option<String>,
    /// Content type of a `multi-key-value-secret`: `application/x-json` (default) or `application/x-yaml`
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureKeyVaultOutput {
    /// Kubernetes Secret output
    #[serde(default)]
    pub secret: Option<SecretOutput>,
    /// Kubernetes ConfigMap output
    #[serde(default)]
    pub config_map: Option<ConfigMapOutput>,
    /// Transformations applied, in order, to `secret` objects (`trim`, `base64encode`, `base64decode`)
    #[serde(default)]
    pub transform: Vec<String>,
}

/// Kubernetes Secret output
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretOutput {
    /// Secret name
    pub name: String,
    /// Secret type, `Opaque` when not set
    #[serde(default, rename = "type")]
    pub secret_type: Option<String>,
    /// Data key to store the value under
    /// Required unless the secret type defines its own keys (`kubernetes.io/tls`, `kubernetes.io/dockerconfigjson`)
    #[serde(default)]
    pub data_key: Option<String>,
}

/// Kubernetes ConfigMap output
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapOutput {
    /// ConfigMap name
    pub name: String,
    /// Data key to store the value under (not used by `multi-key-value-secret`)
    #[serde(default)]
    pub data_key: Option<String>,
}

impl AzureKeyVaultSecret {
    /// Secret output, when one with a non-empty name is declared
    #[must_use]
    pub fn secret_output(&self) -> Option<&SecretOutput> {
        self.spec
            .output
            .secret
            .as_ref()
            .filter(|output| !output.name.is_empty())
    }

    /// ConfigMap output, when one with a non-empty name is declared
    #[must_use]
    pub fn config_map_output(&self) -> Option<&ConfigMapOutput> {
        self.spec
            .output
            .config_map
            .as_ref()
            .filter(|output| !output.name.is_empty())
    }

    /// A resource with no output is inert: never queued, never reconciled
    #[must_use]
    pub fn has_output_defined(&self) -> bool {
        self.secret_output().is_some() || self.config_map_output().is_some()
    }

    /// Type of the generated Secret
    #[must_use]
    pub fn secret_type(&self) -> &str {
        self.secret_output()
            .and_then(|output| output.secret_type.as_deref())
            .filter(|t| !t.is_empty())
            .unwrap_or(crate::constants::DEFAULT_SECRET_TYPE)
    }
}

impl SecretOutput {
    /// Configured data key, ignoring empty strings
    #[must_use]
    pub fn data_key(&self) -> Option<&str> {
        self.data_key.as_deref().filter(|key| !key.is_empty())
    }
}

impl ConfigMapOutput {
    /// Configured data key, ignoring empty strings
    #[must_use]
    pub fn data_key(&self) -> Option<&str> {
        self.data_key.as_deref().filter(|key| !key.is_empty())
    }
}
