//! Multi-key secret handler.
//!
//! The secret value is a JSON (default) or YAML document whose top-level keys become the
//! output's data keys. String values are copied as-is; any other value is stored as JSON.

use super::{ConfigMapData, HandlerError, OutputHandler, SecretData};
use crate::constants::{CONTENT_TYPE_JSON, CONTENT_TYPE_YAML};
use crate::crd::AzureKeyVaultSecret;
use crate::provider::{VaultObjectType, VaultService};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    fn from_content_type(content_type: Option<&str>) -> Result<Self, HandlerError> {
        match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
            None => Ok(Self::Json),
            Some(ct) if ct.eq_ignore_ascii_case(CONTENT_TYPE_JSON) => Ok(Self::Json),
            Some(ct) if ct.eq_ignore_ascii_case(CONTENT_TYPE_YAML) => Ok(Self::Yaml),
            Some(ct) => Err(HandlerError::UnsupportedContentType(ct.to_string())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    fn parse(self, document: &str) -> Result<serde_json::Map<String, Value>, HandlerError> {
        let invalid = |reason: String| HandlerError::InvalidDocument {
            format: self.name(),
            reason,
        };
        let value: Value = match self {
            Self::Json => serde_json::from_str(document).map_err(|e| invalid(e.to_string()))?,
            Self::Yaml => serde_yaml::from_str(document).map_err(|e| invalid(e.to_string()))?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(invalid("top level is not a key/value map".to_string())),
        }
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Handler for `multi-key-value-secret` objects
pub struct MultiKeyHandler<'a> {
    resource: &'a AzureKeyVaultSecret,
    vault: &'a dyn VaultService,
}

impl<'a> MultiKeyHandler<'a> {
    pub fn new(resource: &'a AzureKeyVaultSecret, vault: &'a dyn VaultService) -> Self {
        Self { resource, vault }
    }

    async fn fetch_entries(&self) -> Result<Vec<(String, String)>, HandlerError> {
        let format =
            DocumentFormat::from_content_type(self.resource.spec.vault.object.content_type.as_deref())?;
        let raw = self
            .vault
            .fetch_object(&self.resource.spec.vault, VaultObjectType::MultiKeySecret)
            .await?;
        Ok(format
            .parse(&raw.value)?
            .into_iter()
            .map(|(key, value)| (key, value_to_string(value)))
            .collect())
    }
}

#[async_trait]
impl OutputHandler for MultiKeyHandler<'_> {
    async fn secret_data(&self) -> Result<SecretData, HandlerError> {
        Ok(self
            .fetch_entries()
            .await?
            .into_iter()
            .map(|(key, value)| (key, value.into_bytes()))
            .collect())
    }

    async fn config_map_data(&self) -> Result<ConfigMapData, HandlerError> {
        Ok(self.fetch_entries().await?.into_iter().collect())
    }
}
