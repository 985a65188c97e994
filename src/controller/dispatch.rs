//! # Event Dispatcher
//!
//! Routes `AzureKeyVaultSecret` lifecycle events onto the structural or vault-drift queue.
//!
//! Classification is a pure function ([`classify`]) over the old and new objects so it can
//! be tested without queues. [`Dispatcher`] applies the resulting [`Route`].
//!
//! | Event                          | Output defined     | Route                 |
//! |--------------------------------|--------------------|-----------------------|
//! | Added                          | yes                | structural            |
//! | Updated, same resource version | yes (new)          | vault-drift           |
//! | Updated, new resource version  | old or new         | structural            |
//! | Deleted                        | yes                | structural + forget   |
//! | anything                       | no                 | dropped               |
//!
//! Deleted output objects come from separate watches on Secrets and ConfigMaps. Their
//! controlling resource is sent through the structural pass, which recreates them
//! ([`Dispatcher::dispatch_output_deleted`]).

use crate::controller::queue::{work_key, WorkQueue};
use crate::crd::AzureKeyVaultSecret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A lifecycle notification for a declaring resource
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    Added(Arc<AzureKeyVaultSecret>),
    Updated {
        old: Arc<AzureKeyVaultSecret>,
        new: Arc<AzureKeyVaultSecret>,
    },
    Deleted(Arc<AzureKeyVaultSecret>),
}

impl ResourceEvent {
    /// The object the key is derived from
    fn object(&self) -> &AzureKeyVaultSecret {
        match self {
            Self::Added(obj) | Self::Deleted(obj) => obj,
            Self::Updated { new, .. } => new,
        }
    }
}

/// Where a lifecycle event sends its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Existence and ownership pass
    Structural,
    /// Key Vault drift check
    VaultDrift,
    /// Final structural pass, and pending vault-drift retries are cancelled
    StructuralAndForget,
    /// Inert resource, nothing to do
    Drop,
}

fn resource_version(obj: &AzureKeyVaultSecret) -> Option<&str> {
    obj.metadata.resource_version.as_deref()
}

/// Pick the route for an event
///
/// A resync delivers `Updated` with identical resource versions, which only needs a drift
/// check. Any real change goes through the structural pass, including the transitions where
/// output was just added or just removed.
#[must_use]
pub fn classify(event: &ResourceEvent) -> Route {
    match event {
        ResourceEvent::Added(obj) => {
            if obj.has_output_defined() {
                Route::Structural
            } else {
                Route::Drop
            }
        }
        ResourceEvent::Updated { old, new } => {
            let unchanged = resource_version(old).is_some()
                && resource_version(old) == resource_version(new);
            if unchanged {
                if new.has_output_defined() {
                    Route::VaultDrift
                } else {
                    Route::Drop
                }
            } else if old.has_output_defined() || new.has_output_defined() {
                Route::Structural
            } else {
                Route::Drop
            }
        }
        ResourceEvent::Deleted(obj) => {
            if obj.has_output_defined() {
                Route::StructuralAndForget
            } else {
                Route::Drop
            }
        }
    }
}

/// Queue key of the `AzureKeyVaultSecret` controlling an output object
#[must_use]
pub fn controlling_owner_key(meta: &ObjectMeta) -> Option<String> {
    let namespace = meta.namespace.as_deref()?;
    meta.owner_references
        .iter()
        .flatten()
        .find(|reference| {
            reference.controller == Some(true)
                && reference.kind == AzureKeyVaultSecret::kind(&())
        })
        .map(|reference| work_key(namespace, &reference.name))
}

/// Applies [`classify`] results to the two queues
#[derive(Debug, Clone)]
pub struct Dispatcher {
    structural: Arc<WorkQueue>,
    vault: Arc<WorkQueue>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(structural: Arc<WorkQueue>, vault: Arc<WorkQueue>) -> Self {
        Self { structural, vault }
    }

    /// Enqueue the key for `event`, returning the route taken
    pub fn dispatch(&self, event: &ResourceEvent) -> Route {
        let obj = event.object();
        let (Some(namespace), Some(name)) =
            (obj.metadata.namespace.as_deref(), obj.metadata.name.as_deref())
        else {
            warn!("Dropping event for AzureKeyVaultSecret without namespace or name");
            return Route::Drop;
        };
        let key = work_key(namespace, name);

        let route = classify(event);
        match route {
            Route::Structural => self.structural.add(&key),
            Route::VaultDrift => self.vault.add(&key),
            Route::StructuralAndForget => {
                self.structural.add(&key);
                self.vault.forget(&key);
            }
            Route::Drop => {}
        }
        debug!(key = %key, ?route, "Dispatched AzureKeyVaultSecret event");
        route
    }

    /// Queue a structural pass for the resource controlling a deleted output object
    ///
    /// Returns the queued key, `None` when the object has no controlling resource.
    pub fn dispatch_output_deleted(&self, kind: &str, meta: &ObjectMeta) -> Option<String> {
        let Some(key) = controlling_owner_key(meta) else {
            debug!(kind, name = ?meta.name, "Deleted object has no controlling AzureKeyVaultSecret");
            return None;
        };
        info!(key = %key, kind, output = ?meta.name, "Output object deleted, queueing structural pass");
        self.structural.add(&key);
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backoff::ExponentialBackoff;

    fn akvs(resource_version: &str, with_output: bool) -> Arc<AzureKeyVaultSecret> {
        let output = if with_output {
            "output:\n    secret:\n      name: foo-secret\n"
        } else {
            "output: {}\n"
        };
        let yaml = format!(
            r"
apiVersion: spv.no/v2alpha1
kind: AzureKeyVaultSecret
metadata:
  name: foo
  namespace: ns
  resourceVersion: '{resource_version}'
spec:
  vault:
    name: my-vault
    object:
      name: db
      type: secret
  {output}"
        );
        Arc::new(serde_yaml::from_str(&yaml).expect("valid AzureKeyVaultSecret yaml"))
    }

    #[test]
    fn test_add_with_output_is_structural() {
        assert_eq!(
            classify(&ResourceEvent::Added(akvs("1", true))),
            Route::Structural
        );
    }

    #[test]
    fn test_inert_resources_are_dropped() {
        assert_eq!(classify(&ResourceEvent::Added(akvs("1", false))), Route::Drop);
        assert_eq!(
            classify(&ResourceEvent::Updated {
                old: akvs("1", false),
                new: akvs("1", false),
            }),
            Route::Drop
        );
        assert_eq!(
            classify(&ResourceEvent::Updated {
                old: akvs("1", false),
                new: akvs("2", false),
            }),
            Route::Drop
        );
        assert_eq!(classify(&ResourceEvent::Deleted(akvs("1", false))), Route::Drop);
    }

    #[test]
    fn test_resync_goes_to_vault_queue() {
        let obj = akvs("7", true);
        assert_eq!(
            classify(&ResourceEvent::Updated {
                old: obj.clone(),
                new: obj,
            }),
            Route::VaultDrift
        );
    }

    #[test]
    fn test_real_update_is_structural() {
        assert_eq!(
            classify(&ResourceEvent::Updated {
                old: akvs("1", true),
                new: akvs("2", true),
            }),
            Route::Structural
        );
    }

    #[test]
    fn test_output_added_or_removed_is_structural() {
        assert_eq!(
            classify(&ResourceEvent::Updated {
                old: akvs("1", false),
                new: akvs("2", true),
            }),
            Route::Structural
        );
        assert_eq!(
            classify(&ResourceEvent::Updated {
                old: akvs("1", true),
                new: akvs("2", false),
            }),
            Route::Structural
        );
    }

    #[test]
    fn test_delete_forgets_vault_key() {
        assert_eq!(
            classify(&ResourceEvent::Deleted(akvs("3", true))),
            Route::StructuralAndForget
        );
    }

    fn output_meta(kind: &str, controller: Option<bool>) -> ObjectMeta {
        ObjectMeta {
            name: Some("foo-secret".to_string()),
            namespace: Some("ns".to_string()),
            owner_references: Some(vec![
                k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
                    api_version: "spv.no/v2alpha1".to_string(),
                    kind: kind.to_string(),
                    name: "foo".to_string(),
                    uid: "uid-foo".to_string(),
                    controller,
                    block_owner_deletion: Some(true),
                },
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_controlling_owner_key() {
        assert_eq!(
            controlling_owner_key(&output_meta("AzureKeyVaultSecret", Some(true))).as_deref(),
            Some("ns/foo")
        );
        assert_eq!(
            controlling_owner_key(&output_meta("AzureKeyVaultSecret", None)),
            None
        );
        assert_eq!(controlling_owner_key(&output_meta("Deployment", Some(true))), None);
        assert_eq!(controlling_owner_key(&ObjectMeta::default()), None);
    }

    #[tokio::test]
    async fn test_deleted_output_queues_its_owner_for_a_structural_pass() {
        let structural = WorkQueue::new("structural", ExponentialBackoff::default());
        let vault = WorkQueue::new("vault-drift", ExponentialBackoff::default());
        let dispatcher = Dispatcher::new(structural.clone(), vault.clone());

        let queued =
            dispatcher.dispatch_output_deleted("Secret", &output_meta("AzureKeyVaultSecret", Some(true)));
        assert_eq!(queued.as_deref(), Some("ns/foo"));
        assert_eq!(structural.len(), 1);
        assert!(vault.is_empty());

        let foreign = dispatcher.dispatch_output_deleted("Secret", &output_meta("Deployment", Some(true)));
        assert_eq!(foreign, None);
        assert_eq!(structural.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatcher_enqueues_on_the_classified_queue() {
        let structural = WorkQueue::new("structural", ExponentialBackoff::default());
        let vault = WorkQueue::new("vault-drift", ExponentialBackoff::default());
        let dispatcher = Dispatcher::new(structural.clone(), vault.clone());

        let obj = akvs("5", true);
        dispatcher.dispatch(&ResourceEvent::Updated {
            old: obj.clone(),
            new: obj,
        });
        assert_eq!(vault.len(), 1);
        assert!(structural.is_empty());

        dispatcher.dispatch(&ResourceEvent::Added(akvs("5", false)));
        assert!(structural.is_empty());
    }
}
