//! # Vault Service
//!
//! Read-only access to the external vault.
//!
//! The controller only ever reads single objects, so the collaborator surface is one
//! operation: fetch the raw value of a named object of a given type. Reconcilers depend
//! on the [`VaultService`] trait; production uses [`azure::AzureKeyVaultService`].

pub mod azure;

use crate::crd::AzureKeyVault;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Closed set of Key Vault object kinds the controller can project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultObjectType {
    /// Plain secret value
    Secret,
    /// Certificate, read through its backing secret (PEM bundle)
    Certificate,
    /// Cryptographic key (JSON Web Key)
    Key,
    /// Secret whose value is a JSON or YAML document of named values
    MultiKeySecret,
}

impl VaultObjectType {
    /// Name used in the resource spec and as a metric label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Certificate => "certificate",
            Self::Key => "key",
            Self::MultiKeySecret => "multi-key-value-secret",
        }
    }
}

impl fmt::Display for VaultObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object type string that is not one of the supported kinds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported vault object type '{0}'")]
pub struct UnknownObjectType(pub String);

impl FromStr for VaultObjectType {
    type Err = UnknownObjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "secret" => Ok(Self::Secret),
            "certificate" => Ok(Self::Certificate),
            "key" => Ok(Self::Key),
            "multi-key-value-secret" => Ok(Self::MultiKeySecret),
            _ => Err(UnknownObjectType(s.to_string())),
        }
    }
}

/// Raw object as read from the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawVaultObject {
    /// Object value; for keys, the JSON Web Key serialized as JSON
    pub value: String,
    /// Content type recorded on the object, when the vault has one
    pub content_type: Option<String>,
}

impl RawVaultObject {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Vault read failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum VaultError {
    /// Object (or the requested version) does not exist
    #[error("{object_type} '{object}' not found in vault '{vault}'")]
    NotFound {
        vault: String,
        object: String,
        object_type: VaultObjectType,
    },
    /// Any other failure: authentication, network, throttling, bad response
    #[error("failed to read {object_type} '{object}' from vault '{vault}': {message}")]
    Transient {
        vault: String,
        object: String,
        object_type: VaultObjectType,
        message: String,
    },
}

/// Vault collaborator used by the object-type handlers
#[async_trait]
pub trait VaultService: Send + Sync + fmt::Debug {
    /// Read the object referenced by `vault` as the given type
    ///
    /// # Errors
    /// [`VaultError::NotFound`] when the object is missing, [`VaultError::Transient`] otherwise
    async fn fetch_object(
        &self,
        vault: &AzureKeyVault,
        object_type: VaultObjectType,
    ) -> Result<RawVaultObject, VaultError>;
}
