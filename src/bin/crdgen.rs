//! Prints the `AzureKeyVaultSecret` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/azurekeyvaultsecret.yaml
//! ```

use keyvault_secret_controller::crd::AzureKeyVaultSecret;
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crd = AzureKeyVaultSecret::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
