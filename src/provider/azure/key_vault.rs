//! # Azure Key Vault Client
//!
//! Read-only client for Azure Key Vault.
//!
//! This module provides functionality to:
//! - Read secrets and multi-key secrets (Secrets API)
//! - Read certificates through their backing secret, which holds the PEM or PKCS#12 bundle
//! - Read keys (Keys API), returned as a JSON Web Key
//! - Authenticate with Workload Identity, falling back to Managed Identity
//!
//! One resource may reference any vault, so clients are created lazily and cached per
//! vault URL.

use crate::crd::AzureKeyVault;
use crate::observability::metrics;
use crate::provider::{RawVaultObject, VaultError, VaultObjectType, VaultService};
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use azure_security_keyvault_keys::{models::KeyClientGetKeyOptions, KeyClient};
use azure_security_keyvault_secrets::{
    models::{Secret, SecretClientGetSecretOptions},
    SecretClient,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Build the vault URL from a vault name
///
/// Format: `https://{vault-name}.vault.azure.net/`. A value that already is a URL is kept.
#[must_use]
pub fn vault_url(vault_name: &str) -> String {
    if vault_name.starts_with("https://") {
        vault_name.to_string()
    } else {
        format!("https://{vault_name}.vault.azure.net/")
    }
}

/// Azure reports missing objects through the error message only
fn is_not_found(message: &str) -> bool {
    message.contains("SecretNotFound")
        || message.contains("KeyNotFound")
        || message.contains("CertificateNotFound")
        || message.contains("404")
        || message.contains("not found")
}

/// Azure Key Vault implementation of [`VaultService`]
pub struct AzureKeyVaultService {
    credential: Arc<dyn TokenCredential>,
    secret_clients: Mutex<HashMap<String, Arc<SecretClient>>>,
    key_clients: Mutex<HashMap<String, Arc<KeyClient>>>,
}

impl std::fmt::Debug for AzureKeyVaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let vaults: Vec<String> = self
            .secret_clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("AzureKeyVaultService")
            .field("vaults", &vaults)
            .finish_non_exhaustive()
    }
}

impl AzureKeyVaultService {
    /// Create the service and its credential
    ///
    /// Workload Identity is used when the pod has a federated token
    /// (`AZURE_FEDERATED_TOKEN_FILE`), otherwise Managed Identity.
    ///
    /// # Errors
    /// Returns an error if the credential cannot be created
    pub fn new() -> Result<Self> {
        let credential: Arc<dyn TokenCredential> =
            if std::env::var("AZURE_FEDERATED_TOKEN_FILE").is_ok() {
                let client_id = std::env::var("AZURE_CLIENT_ID").ok();
                info!(
                    client_id = client_id.as_deref().unwrap_or("<default>"),
                    "Using Azure Workload Identity authentication"
                );
                let options = azure_identity::WorkloadIdentityCredentialOptions {
                    client_id,
                    ..Default::default()
                };
                WorkloadIdentityCredential::new(Some(options))
                    .context("Failed to create WorkloadIdentityCredential")?
            } else {
                info!("No federated token found, using Managed Identity");
                ManagedIdentityCredential::new(None)
                    .context("Failed to create ManagedIdentityCredential")?
            };

        Ok(Self {
            credential,
            secret_clients: Mutex::new(HashMap::new()),
            key_clients: Mutex::new(HashMap::new()),
        })
    }

    fn secret_client(&self, url: &str) -> Result<Arc<SecretClient>> {
        let mut clients = self
            .secret_clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(url) {
            return Ok(Arc::clone(client));
        }
        debug!(vault.url = url, "Creating Azure Key Vault SecretClient");
        let client = Arc::new(
            SecretClient::new(url, Arc::clone(&self.credential), None)
                .context("Failed to create Azure Key Vault SecretClient")?,
        );
        clients.insert(url.to_string(), Arc::clone(&client));
        Ok(client)
    }

    fn key_client(&self, url: &str) -> Result<Arc<KeyClient>> {
        let mut clients = self
            .key_clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(url) {
            return Ok(Arc::clone(client));
        }
        debug!(vault.url = url, "Creating Azure Key Vault KeyClient");
        let client = Arc::new(
            KeyClient::new(url, Arc::clone(&self.credential), None)
                .context("Failed to create Azure Key Vault KeyClient")?,
        );
        clients.insert(url.to_string(), Arc::clone(&client));
        Ok(client)
    }

    async fn get_secret(
        &self,
        url: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<RawVaultObject, String> {
        let client = self.secret_client(url).map_err(|e| format!("{e:#}"))?;
        let options = SecretClientGetSecretOptions {
            secret_version: version.map(ToString::to_string),
            ..Default::default()
        };
        let response = client
            .get_secret(name, Some(options))
            .await
            .map_err(|e| e.to_string())?;
        let secret = serde_json::from_slice::<Secret>(&response.into_body())
            .map_err(|e| format!("Failed to deserialize Azure secret response: {e}"))?;
        let value = secret
            .value
            .ok_or_else(|| format!("secret '{name}' has no value"))?;
        let raw = RawVaultObject::new(value);
        Ok(match secret.content_type {
            Some(content_type) => raw.with_content_type(content_type),
            None => raw,
        })
    }

    async fn get_key(
        &self,
        url: &str,
        name: &str,
        version: Option<&str>,
    ) -> Result<RawVaultObject, String> {
        let client = self.key_client(url).map_err(|e| format!("{e:#}"))?;
        let options = KeyClientGetKeyOptions {
            key_version: version.map(ToString::to_string),
            ..Default::default()
        };
        let response = client
            .get_key(name, Some(options))
            .await
            .map_err(|e| e.to_string())?;
        let body = serde_json::from_slice::<serde_json::Value>(&response.into_body())
            .map_err(|e| format!("Failed to deserialize Azure key response: {e}"))?;
        let jwk = body
            .get("key")
            .filter(|key| !key.is_null())
            .ok_or_else(|| format!("key '{name}' has no key material"))?;
        Ok(RawVaultObject::new(jwk.to_string()))
    }
}

#[async_trait]
impl VaultService for AzureKeyVaultService {
    async fn fetch_object(
        &self,
        vault: &AzureKeyVault,
        object_type: VaultObjectType,
    ) -> Result<RawVaultObject, VaultError> {
        let url = vault_url(&vault.name);
        let object = &vault.object;
        let version = object.version.as_deref().filter(|v| !v.is_empty());
        let span = tracing::debug_span!(
            "azure.keyvault.fetch",
            vault.name = %vault.name,
            object.name = %object.name,
            object.kind = %object_type,
        );
        let start = Instant::now();

        let result = async {
            match object_type {
                VaultObjectType::Secret
                | VaultObjectType::Certificate
                | VaultObjectType::MultiKeySecret => {
                    self.get_secret(&url, &object.name, version).await
                }
                VaultObjectType::Key => self.get_key(&url, &object.name, version).await,
            }
        }
        .instrument(span)
        .await;

        match result {
            Ok(raw) => {
                metrics::record_vault_fetch(object_type.as_str(), start.elapsed().as_secs_f64());
                Ok(raw)
            }
            Err(message) => {
                metrics::increment_vault_fetch_errors(object_type.as_str());
                if is_not_found(&message) {
                    Err(VaultError::NotFound {
                        vault: vault.name.clone(),
                        object: object.name.clone(),
                        object_type,
                    })
                } else {
                    Err(VaultError::Transient {
                        vault: vault.name.clone(),
                        object: object.name.clone(),
                        object_type,
                        message,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_url_from_name() {
        assert_eq!(vault_url("my-vault"), "https://my-vault.vault.azure.net/");
    }

    #[test]
    fn test_vault_url_kept_when_already_a_url() {
        assert_eq!(
            vault_url("https://custom-vault.vault.azure.net/"),
            "https://custom-vault.vault.azure.net/"
        );
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found("SecretNotFound: A secret with (name/id) db was not found"));
        assert!(is_not_found("HTTP 404"));
        assert!(is_not_found("KeyNotFound"));
        assert!(!is_not_found("Forbidden: caller is not authorized"));
        assert!(!is_not_found("connection reset by peer"));
    }
}
