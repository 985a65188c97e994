//! # Azure Providers
//!
//! - `key_vault`: read-only Azure Key Vault access (secrets, certificates, keys)

pub mod key_vault;

// Re-export for convenience
pub use key_vault::AzureKeyVaultService;
