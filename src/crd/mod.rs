//! # Custom Resource Definitions
//!
//! CRD types for the Key Vault Secret Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `AzureKeyVaultSecret` specification and output helpers
//! - `status.rs` - Status fields written back by the controller

mod spec;
mod status;

// Re-export all public types
pub use spec::{
    AzureKeyVault, AzureKeyVaultObject, AzureKeyVaultOutput, AzureKeyVaultSecret,
    AzureKeyVaultSecretSpec, ConfigMapOutput, SecretOutput,
};
pub use status::AzureKeyVaultSecretStatus;
