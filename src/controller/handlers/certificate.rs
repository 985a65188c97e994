//! Certificate handler and PEM bundle splitting.
//!
//! Key Vault exposes a certificate together with its private key through the
//! certificate's backing secret. Only PEM bundles can be projected; PKCS#12 is rejected.

use super::{config_map_data_key, secret_data_key, ConfigMapData, HandlerError, OutputHandler, SecretData};
use crate::constants::{CONTENT_TYPE_PKCS12, SECRET_TYPE_TLS, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use crate::crd::AzureKeyVaultSecret;
use crate::provider::{VaultObjectType, VaultService};
use async_trait::async_trait;
use rustls_pemfile::Item;

/// PEM bundle split into its certificate chain and private key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PemBundle {
    /// Certificates in bundle order, PEM encoded
    pub chain: String,
    /// Private key, PEM encoded
    pub private_key: Option<String>,
}

/// Split a PEM bundle, keeping each block's original text
///
/// # Errors
/// [`HandlerError::InvalidPem`] when the bundle cannot be parsed or holds no certificate
pub fn split_pem_bundle(pem: &str) -> Result<PemBundle, HandlerError> {
    let mut certificates: Vec<&str> = Vec::new();
    let mut private_key: Option<&str> = None;
    let mut rest = pem.as_bytes();

    loop {
        let (item, remaining) = match rustls_pemfile::read_one_from_slice(rest) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => break,
            Err(e) => return Err(HandlerError::InvalidPem(format!("{e:?}"))),
        };
        let consumed = &pem[pem.len() - rest.len()..pem.len() - remaining.len()];
        let block = consumed
            .find("-----BEGIN")
            .map_or(consumed, |start| &consumed[start..])
            .trim_end();
        match item {
            Item::X509Certificate(_) => certificates.push(block),
            Item::Pkcs1Key(_) | Item::Pkcs8Key(_) | Item::Sec1Key(_) => {
                if private_key.is_none() {
                    private_key = Some(block);
                }
            }
            _ => {}
        }
        rest = remaining;
    }

    if certificates.is_empty() {
        return Err(HandlerError::InvalidPem(
            "no certificate found in bundle".to_string(),
        ));
    }

    Ok(PemBundle {
        chain: join_blocks(&certificates),
        private_key: private_key.map(|key| format!("{key}\n")),
    })
}

fn join_blocks(blocks: &[&str]) -> String {
    let mut joined = blocks.join("\n");
    joined.push('\n');
    joined
}

/// Handler for `certificate` objects
pub struct CertificateHandler<'a> {
    resource: &'a AzureKeyVaultSecret,
    vault: &'a dyn VaultService,
}

impl<'a> CertificateHandler<'a> {
    pub fn new(resource: &'a AzureKeyVaultSecret, vault: &'a dyn VaultService) -> Self {
        Self { resource, vault }
    }

    async fn fetch_pem(&self) -> Result<String, HandlerError> {
        let raw = self
            .vault
            .fetch_object(&self.resource.spec.vault, VaultObjectType::Certificate)
            .await?;
        if let Some(content_type) = raw
            .content_type
            .as_deref()
            .filter(|ct| ct.eq_ignore_ascii_case(CONTENT_TYPE_PKCS12))
        {
            return Err(HandlerError::UnsupportedCertificateFormat(
                content_type.to_string(),
            ));
        }
        Ok(raw.value)
    }
}

#[async_trait]
impl OutputHandler for CertificateHandler<'_> {
    async fn secret_data(&self) -> Result<SecretData, HandlerError> {
        let mut data = SecretData::new();
        if self.resource.secret_type() == SECRET_TYPE_TLS {
            let bundle = split_pem_bundle(&self.fetch_pem().await?)?;
            let key = bundle.private_key.ok_or_else(|| {
                HandlerError::InvalidPem("certificate has no exportable private key".to_string())
            })?;
            data.insert(TLS_CERT_KEY.to_string(), bundle.chain.into_bytes());
            data.insert(TLS_PRIVATE_KEY_KEY.to_string(), key.into_bytes());
        } else {
            let key = secret_data_key(self.resource, VaultObjectType::Certificate)?;
            data.insert(key, self.fetch_pem().await?.into_bytes());
        }
        Ok(data)
    }

    async fn config_map_data(&self) -> Result<ConfigMapData, HandlerError> {
        let key = config_map_data_key(self.resource, VaultObjectType::Certificate)?;
        let bundle = split_pem_bundle(&self.fetch_pem().await?)?;
        let mut data = ConfigMapData::new();
        data.insert(key, bundle.chain);
        Ok(data)
    }
}
