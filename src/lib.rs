//! Key Vault Secret Controller Library
//!
//! Projects Azure Key Vault objects (secrets, certificates, keys and multi-key secrets)
//! into Kubernetes Secrets and ConfigMaps declared by `AzureKeyVaultSecret` resources.
//!
//! Tests are included in the module files and under `tests/`.

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;
