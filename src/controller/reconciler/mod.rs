//! # Reconciler
//!
//! The two sync passes run for a queued `namespace/name` key.
//!
//! - [`output::reconcile_outputs`] (structural queue): the output Secret/ConfigMap exists
//!   and is owned by the `AzureKeyVaultSecret`. Never touches payload data.
//! - [`vault::reconcile_vault`] (vault-drift queue): fetches the Key Vault object, compares
//!   its digest with the one recorded in status and rewrites the output only on a change.
//!
//! Both read the declaring resource from the watch cache. A resource that is gone is a
//! successful pass: nothing is left to do and the key must not be retried.
//!
//! ## Ownership
//!
//! An output object belongs to a resource when it carries a controller owner reference
//! with the resource's kind, name and UID. An object with that name but without such a
//! reference is a naming collision: it is reported and never written.

pub mod output;
pub mod vault;

pub use output::reconcile_outputs;
pub use vault::reconcile_vault;

use crate::controller::cluster::{ClusterApi, ClusterError, ResourceLister};
use crate::controller::events::{reasons, EventRecorder, Severity};
use crate::controller::handlers::HandlerError;
use crate::controller::queue::WorkQueue;
use crate::crd::AzureKeyVaultSecret;
use crate::observability::metrics;
use crate::provider::VaultService;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Collaborators shared by every reconciliation pass
#[derive(Clone)]
pub struct Context {
    /// Watch cache of declaring resources
    pub lister: Arc<dyn ResourceLister>,
    pub cluster: Arc<dyn ClusterApi>,
    pub vault: Arc<dyn VaultService>,
    pub recorder: Arc<dyn EventRecorder>,
    /// Kicked when an output is created, so it is filled without waiting for a resync
    pub vault_queue: Arc<WorkQueue>,
    /// Kicked when the vault pass finds an output missing
    pub structural_queue: Arc<WorkQueue>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("vault", &self.vault)
            .field("vault_queue", &self.vault_queue.name())
            .field("structural_queue", &self.structural_queue.name())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("invalid work key '{0}', expected namespace/name")]
    InvalidKey(String),

    #[error("AzureKeyVaultSecret has no metadata.{0}")]
    MissingMetadata(&'static str),

    #[error("{kind} {namespace}/{name} already exists and is not managed by AzureKeyVaultSecret {owner}")]
    NotOwned {
        kind: &'static str,
        namespace: String,
        name: String,
        owner: String,
    },

    #[error("{kind} {namespace}/{name} does not exist yet")]
    OutputMissing {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ReconcilerError {
    /// Whether the failure comes from the resource itself; retrying will not fix it
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        match self {
            Self::InvalidKey(_) | Self::MissingMetadata(_) => true,
            Self::Handler(e) => e.is_malformed(),
            Self::NotOwned { .. } | Self::OutputMissing { .. } | Self::Cluster(_) => false,
        }
    }

    /// Whether an output object is taken by something the resource does not own
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::NotOwned { .. })
    }
}

/// Controller owner reference pointing at the declaring resource
pub(crate) fn owner_reference(
    resource: &AzureKeyVaultSecret,
) -> Result<OwnerReference, ReconcilerError> {
    resource
        .controller_owner_ref(&())
        .ok_or(ReconcilerError::MissingMetadata("uid"))
}

/// Whether `meta` carries a controller reference to `owner`
pub(crate) fn is_controlled_by(meta: &ObjectMeta, owner: &OwnerReference) -> bool {
    meta.owner_references.iter().flatten().any(|reference| {
        reference.controller == Some(true)
            && reference.kind == owner.kind
            && reference.name == owner.name
            && reference.uid == owner.uid
    })
}

/// Fail, with a recorded event, unless the output object is owned by `resource`
pub(crate) async fn ensure_owned(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    owner: &OwnerReference,
    kind: &'static str,
    meta: &ObjectMeta,
    action: &str,
) -> Result<(), ReconcilerError> {
    if is_controlled_by(meta, owner) {
        return Ok(());
    }

    let namespace = meta.namespace.clone().unwrap_or_default();
    let name = meta.name.clone().unwrap_or_default();
    warn!(
        kind,
        namespace = %namespace,
        name = %name,
        owner = %owner.name,
        "Output object exists and is not owned by this AzureKeyVaultSecret"
    );
    metrics::increment_ownership_conflicts(kind);
    ctx.recorder
        .record(
            &resource.object_ref(&()),
            Severity::Warning,
            reasons::ERR_RESOURCE_EXISTS,
            action,
            format!("Resource {name} already exists and is not managed by AzureKeyVaultSecret"),
        )
        .await;

    Err(ReconcilerError::NotOwned {
        kind,
        namespace,
        name,
        owner: owner.name.clone(),
    })
}
