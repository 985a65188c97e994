//! # Status Persister
//!
//! Writes the controller-owned status fields of an `AzureKeyVaultSecret`.
//!
//! The status has two field groups, one per output kind, written by independent passes.
//! Every write re-reads the resource from the API server, changes only its own group and
//! sends the result with the fresh resource version. A conflict means another writer got
//! in between; the write is retried from a new read.

use crate::constants::STATUS_UPDATE_ATTEMPTS;
use crate::controller::cluster::{ClusterApi, ClusterError};
use crate::controller::hash::{ConfigMapDigest, SecretDigest};
use crate::crd::AzureKeyVaultSecretStatus;
use crate::observability::metrics;
use tracing::{debug, warn};

/// One change to the controller-owned status fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Secret data was written from Key Vault
    Secret { name: String, hash: SecretDigest },
    /// ConfigMap data was written from Key Vault
    ConfigMap { name: String, hash: ConfigMapDigest },
    /// Secret was (re)created empty, so the recorded hash no longer describes it
    InvalidateSecret,
    /// ConfigMap was (re)created empty
    InvalidateConfigMap,
}

impl StatusUpdate {
    /// Apply the change; `now` is the RFC 3339 timestamp for `lastAzureUpdate`
    pub fn apply(&self, status: &mut AzureKeyVaultSecretStatus, now: &str) {
        match self {
            Self::Secret { name, hash } => {
                status.secret_name = Some(name.clone());
                status.secret_hash = Some(hash.to_string());
                status.last_azure_update = Some(now.to_string());
            }
            Self::ConfigMap { name, hash } => {
                status.config_map_name = Some(name.clone());
                status.config_map_hash = Some(hash.to_string());
                status.last_azure_update = Some(now.to_string());
            }
            Self::InvalidateSecret => status.secret_hash = None,
            Self::InvalidateConfigMap => status.config_map_hash = None,
        }
    }
}

/// Result of a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Status was written
    Written,
    /// Status already had the requested values
    Unchanged,
    /// Resource no longer exists
    Gone,
}

/// Persist one status change with read-modify-write
///
/// # Errors
/// The last [`ClusterError::Conflict`] when every attempt conflicted, or any other
/// cluster error
pub async fn persist_status(
    cluster: &dyn ClusterApi,
    namespace: &str,
    name: &str,
    update: &StatusUpdate,
) -> Result<StatusOutcome, ClusterError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut fresh = match cluster.get_declaring(namespace, name).await {
            Ok(resource) => resource,
            Err(e) if e.is_not_found() => return Ok(StatusOutcome::Gone),
            Err(e) => return Err(e),
        };

        let current = fresh.status.clone().unwrap_or_default();
        let mut desired = current.clone();
        update.apply(&mut desired, &chrono::Utc::now().to_rfc3339());
        if status_groups_equal(&current, &desired) {
            return Ok(StatusOutcome::Unchanged);
        }
        fresh.status = Some(desired);

        match cluster.update_status(&fresh).await {
            Ok(_) => {
                debug!(namespace, name, ?update, "Status updated");
                return Ok(StatusOutcome::Written);
            }
            Err(e) if e.is_not_found() => return Ok(StatusOutcome::Gone),
            Err(e) if e.is_conflict() && attempt < STATUS_UPDATE_ATTEMPTS => {
                metrics::increment_status_conflicts();
                warn!(
                    namespace,
                    name,
                    attempt,
                    "Status update conflicted, retrying with a fresh copy"
                );
            }
            Err(e) => {
                if e.is_conflict() {
                    metrics::increment_status_conflicts();
                }
                return Err(e);
            }
        }
    }
}

/// Equality ignoring the timestamp, which changes on every apply
fn status_groups_equal(a: &AzureKeyVaultSecretStatus, b: &AzureKeyVaultSecretStatus) -> bool {
    a.secret_name == b.secret_name
        && a.secret_hash == b.secret_hash
        && a.config_map_name == b.config_map_name
        && a.config_map_hash == b.config_map_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::hash::{config_map_digest, secret_digest};
    use std::collections::BTreeMap;

    fn secret_hash() -> SecretDigest {
        let mut data = BTreeMap::new();
        data.insert("password".to_string(), b"p@ss".to_vec());
        secret_digest(&data)
    }

    #[test]
    fn test_secret_update_leaves_config_map_group_alone() {
        let mut status = AzureKeyVaultSecretStatus {
            config_map_name: Some("cm".to_string()),
            config_map_hash: Some("cm-hash".to_string()),
            ..Default::default()
        };
        StatusUpdate::Secret {
            name: "foo-secret".to_string(),
            hash: secret_hash(),
        }
        .apply(&mut status, "2024-01-01T00:00:00Z");

        assert_eq!(status.secret_name.as_deref(), Some("foo-secret"));
        assert_eq!(status.secret_hash, Some(secret_hash().to_string()));
        assert_eq!(status.config_map_name.as_deref(), Some("cm"));
        assert_eq!(status.config_map_hash.as_deref(), Some("cm-hash"));
        assert_eq!(
            status.last_azure_update.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_config_map_update() {
        let mut data = BTreeMap::new();
        data.insert("k".to_string(), "v".to_string());
        let hash = config_map_digest(&data);
        let mut status = AzureKeyVaultSecretStatus::default();
        StatusUpdate::ConfigMap {
            name: "foo-cm".to_string(),
            hash: hash.clone(),
        }
        .apply(&mut status, "now");
        assert_eq!(status.config_map_hash, Some(hash.to_string()));
        assert!(status.secret_hash.is_none());
    }

    #[test]
    fn test_invalidate_only_clears_hash() {
        let mut status = AzureKeyVaultSecretStatus {
            secret_name: Some("foo-secret".to_string()),
            secret_hash: Some("abc".to_string()),
            last_azure_update: Some("then".to_string()),
            ..Default::default()
        };
        StatusUpdate::InvalidateSecret.apply(&mut status, "now");
        assert!(status.secret_hash.is_none());
        assert_eq!(status.secret_name.as_deref(), Some("foo-secret"));
        assert_eq!(status.last_azure_update.as_deref(), Some("then"));
    }

    #[test]
    fn test_equality_ignores_timestamp() {
        let a = AzureKeyVaultSecretStatus {
            last_azure_update: Some("a".to_string()),
            ..Default::default()
        };
        let b = AzureKeyVaultSecretStatus {
            last_azure_update: Some("b".to_string()),
            ..Default::default()
        };
        assert!(status_groups_equal(&a, &b));
    }
}
