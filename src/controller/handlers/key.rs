//! Key handler: projects the key as its JSON Web Key.

use super::{config_map_data_key, secret_data_key, ConfigMapData, HandlerError, OutputHandler, SecretData};
use crate::crd::AzureKeyVaultSecret;
use crate::provider::{VaultObjectType, VaultService};
use async_trait::async_trait;

/// Handler for `key` objects
pub struct KeyHandler<'a> {
    resource: &'a AzureKeyVaultSecret,
    vault: &'a dyn VaultService,
}

impl<'a> KeyHandler<'a> {
    pub fn new(resource: &'a AzureKeyVaultSecret, vault: &'a dyn VaultService) -> Self {
        Self { resource, vault }
    }

    async fn fetch_key(&self) -> Result<String, HandlerError> {
        Ok(self
            .vault
            .fetch_object(&self.resource.spec.vault, VaultObjectType::Key)
            .await?
            .value)
    }
}

#[async_trait]
impl OutputHandler for KeyHandler<'_> {
    async fn secret_data(&self) -> Result<SecretData, HandlerError> {
        let key = secret_data_key(self.resource, VaultObjectType::Key)?;
        let mut data = SecretData::new();
        data.insert(key, self.fetch_key().await?.into_bytes());
        Ok(data)
    }

    async fn config_map_data(&self) -> Result<ConfigMapData, HandlerError> {
        let key = config_map_data_key(self.resource, VaultObjectType::Key)?;
        let mut data = ConfigMapData::new();
        data.insert(key, self.fetch_key().await?);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{resource, StaticVault};
    use super::*;

    const JWK: &str = r#"{"kty":"RSA","n":"0vx7","e":"AQAB"}"#;

    #[tokio::test]
    async fn test_key_goes_under_data_key() {
        let akvs = resource(
            "  vault:\n    name: v\n    object:\n      name: signing\n      type: key\n  output:\n    secret:\n      name: out\n      dataKey: jwk.json\n    configMap:\n      name: out-cm\n      dataKey: public.json\n",
        );
        let vault = StaticVault::value(JWK);
        let handler = KeyHandler::new(&akvs, &vault);

        let secret = handler.secret_data().await.unwrap();
        assert_eq!(secret["jwk.json"], JWK.as_bytes());

        let config_map = handler.config_map_data().await.unwrap();
        assert_eq!(config_map["public.json"], JWK);
    }

    #[tokio::test]
    async fn test_config_map_without_data_key_is_malformed() {
        let akvs = resource(
            "  vault:\n    name: v\n    object:\n      name: signing\n      type: key\n  output:\n    configMap:\n      name: out-cm\n",
        );
        let vault = StaticVault::value(JWK);
        let err = KeyHandler::new(&akvs, &vault)
            .config_map_data()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerError::MissingDataKey {
                output: "configMap",
                object_type: VaultObjectType::Key
            }
        ));
    }
}
