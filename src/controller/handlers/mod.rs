//! # Object-Type Handlers
//!
//! Turn one Key Vault object into the data of the output Secret and ConfigMap.
//!
//! There is one handler per [`VaultObjectType`]; [`handler_for`] is the only place that
//! dispatches on the type and the match is exhaustive. Adding a vault object type means
//! adding a variant and a handler.
//!
//! | Vault type | Secret output | ConfigMap output |
//! |---|---|---|
//! | `secret` | `{dataKey: value}`, `tls.crt`/`tls.key` or `.dockerconfigjson` by secret type | `{dataKey: value}` |
//! | `certificate` | `tls.crt`/`tls.key` for TLS secrets, else `{dataKey: PEM bundle}` | `{dataKey: certificate chain}` |
//! | `key` | `{dataKey: JSON Web Key}` | `{dataKey: JSON Web Key}` |
//! | `multi-key-value-secret` | one entry per top-level document key | same, as strings |

mod certificate;
mod key;
mod multi_key;
mod secret;
mod transform;

pub use certificate::{split_pem_bundle, CertificateHandler, PemBundle};
pub use key::KeyHandler;
pub use multi_key::MultiKeyHandler;
pub use secret::SecretHandler;
pub use transform::{Transform, Transformations};

use crate::crd::AzureKeyVaultSecret;
use crate::provider::{UnknownObjectType, VaultError, VaultObjectType, VaultService};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Secret payload: data key to raw bytes
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// ConfigMap payload: data key to text
pub type ConfigMapData = BTreeMap<String, String>;

/// Handler failures
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    UnsupportedObjectType(#[from] UnknownObjectType),

    #[error("{output} output needs a dataKey for vault object type '{object_type}'")]
    MissingDataKey {
        output: &'static str,
        object_type: VaultObjectType,
    },

    #[error("unsupported transform '{0}', expected one of trim, base64encode, base64decode")]
    UnsupportedTransform(String),

    #[error("transform '{transform}' failed: {reason}")]
    TransformFailed {
        transform: &'static str,
        reason: String,
    },

    #[error("certificate content type '{0}' is not supported, only PEM certificates can be projected")]
    UnsupportedCertificateFormat(String),

    #[error("invalid PEM bundle: {0}")]
    InvalidPem(String),

    #[error("unsupported multi-key content type '{0}', expected application/x-json or application/x-yaml")]
    UnsupportedContentType(String),

    #[error("multi-key secret is not a valid {format} document: {reason}")]
    InvalidDocument {
        format: &'static str,
        reason: String,
    },

    #[error("value for '{0}' is not valid UTF-8 and cannot be stored in a ConfigMap")]
    NotUtf8(String),

    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl HandlerError {
    /// Whether the resource itself is wrong, so a retry cannot succeed on its own
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Vault(_))
    }
}

/// Produces output data for one declaring resource
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Data for the output Secret
    async fn secret_data(&self) -> Result<SecretData, HandlerError>;

    /// Data for the output ConfigMap
    async fn config_map_data(&self) -> Result<ConfigMapData, HandlerError>;
}

/// Select the handler for the resource's vault object type
///
/// Configuration that can be checked without the vault (object type, transforms) is
/// validated here, before any vault call.
///
/// # Errors
/// Returns a malformed-configuration [`HandlerError`]
pub fn handler_for<'a>(
    resource: &'a AzureKeyVaultSecret,
    vault: &'a dyn VaultService,
) -> Result<Box<dyn OutputHandler + 'a>, HandlerError> {
    let object_type: VaultObjectType = resource.spec.vault.object.object_type.parse()?;
    Ok(match object_type {
        VaultObjectType::Secret => {
            let transformations = Transformations::parse(&resource.spec.output.transform)?;
            Box::new(SecretHandler::new(resource, vault, transformations))
        }
        VaultObjectType::Certificate => Box::new(CertificateHandler::new(resource, vault)),
        VaultObjectType::Key => Box::new(KeyHandler::new(resource, vault)),
        VaultObjectType::MultiKeySecret => Box::new(MultiKeyHandler::new(resource, vault)),
    })
}

/// Data key of the Secret output, required by single-value handlers
fn secret_data_key(
    resource: &AzureKeyVaultSecret,
    object_type: VaultObjectType,
) -> Result<String, HandlerError> {
    resource
        .secret_output()
        .and_then(|output| output.data_key())
        .map(ToString::to_string)
        .ok_or(HandlerError::MissingDataKey {
            output: "secret",
            object_type,
        })
}

/// Data key of the ConfigMap output, required by single-value handlers
fn config_map_data_key(
    resource: &AzureKeyVaultSecret,
    object_type: VaultObjectType,
) -> Result<String, HandlerError> {
    resource
        .config_map_output()
        .and_then(|output| output.data_key())
        .map(ToString::to_string)
        .ok_or(HandlerError::MissingDataKey {
            output: "configMap",
            object_type,
        })
}
