//! Plain secret handler.

use super::{
    config_map_data_key, secret_data_key, split_pem_bundle, ConfigMapData, HandlerError,
    OutputHandler, SecretData, Transformations,
};
use crate::constants::{
    DOCKER_CONFIG_JSON_KEY, SECRET_TYPE_DOCKER_CONFIG_JSON, SECRET_TYPE_TLS, TLS_CERT_KEY,
    TLS_PRIVATE_KEY_KEY,
};
use crate::crd::AzureKeyVaultSecret;
use crate::provider::{VaultObjectType, VaultService};
use async_trait::async_trait;

/// Handler for `secret` objects, applying the configured transformations
pub struct SecretHandler<'a> {
    resource: &'a AzureKeyVaultSecret,
    vault: &'a dyn VaultService,
    transformations: Transformations,
}

impl<'a> SecretHandler<'a> {
    pub fn new(
        resource: &'a AzureKeyVaultSecret,
        vault: &'a dyn VaultService,
        transformations: Transformations,
    ) -> Self {
        Self {
            resource,
            vault,
            transformations,
        }
    }

    async fn fetch_value(&self) -> Result<Vec<u8>, HandlerError> {
        let raw = self
            .vault
            .fetch_object(&self.resource.spec.vault, VaultObjectType::Secret)
            .await?;
        self.transformations.apply(raw.value.into_bytes())
    }

    fn utf8(&self, value: Vec<u8>) -> Result<String, HandlerError> {
        String::from_utf8(value)
            .map_err(|_| HandlerError::NotUtf8(self.resource.spec.vault.object.name.clone()))
    }
}

#[async_trait]
impl OutputHandler for SecretHandler<'_> {
    async fn secret_data(&self) -> Result<SecretData, HandlerError> {
        let mut data = SecretData::new();
        match self.resource.secret_type() {
            SECRET_TYPE_TLS => {
                let pem = self.utf8(self.fetch_value().await?)?;
                let bundle = split_pem_bundle(&pem)?;
                let key = bundle.private_key.ok_or_else(|| {
                    HandlerError::InvalidPem("secret holds no private key".to_string())
                })?;
                data.insert(TLS_CERT_KEY.to_string(), bundle.chain.into_bytes());
                data.insert(TLS_PRIVATE_KEY_KEY.to_string(), key.into_bytes());
            }
            SECRET_TYPE_DOCKER_CONFIG_JSON => {
                data.insert(DOCKER_CONFIG_JSON_KEY.to_string(), self.fetch_value().await?);
            }
            _ => {
                let key = secret_data_key(self.resource, VaultObjectType::Secret)?;
                data.insert(key, self.fetch_value().await?);
            }
        }
        Ok(data)
    }

    async fn config_map_data(&self) -> Result<ConfigMapData, HandlerError> {
        let key = config_map_data_key(self.resource, VaultObjectType::Secret)?;
        let value = self.utf8(self.fetch_value().await?)?;
        let mut data = ConfigMapData::new();
        data.insert(key, value);
        Ok(data)
    }
}
