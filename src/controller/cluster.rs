//! # Cluster Access
//!
//! The reconcilers talk to the cluster through two small traits so they can run against
//! in-memory fakes in tests:
//!
//! - [`ResourceLister`] reads declaring resources from the watch cache
//! - [`ClusterApi`] reads and writes output objects and the declaring resource's status
//!
//! [`KubeClusterApi`] and the reflector `Store` are the production implementations.

use crate::constants::CONTROLLER_NAME;
use crate::crd::AzureKeyVaultSecret;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Api, Client};
use std::sync::Arc;

/// Cluster API failures
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("object is missing metadata.{0}")]
    MissingMetadata(&'static str),

    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),
}

impl ClusterError {
    /// Map a kube error, turning 404 and 409 into their own variants
    #[must_use]
    pub fn from_kube(error: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Self {
        match error {
            kube::Error::Api(e) if e.code == 404 => Self::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            kube::Error::Api(e) if e.code == 409 => Self::Conflict {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: e.message,
            },
            other => Self::Api(other),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Read access to the watch cache of declaring resources
pub trait ResourceLister: Send + Sync {
    /// Cached resource, `None` when it is not (or no longer) in the cache
    fn get_resource(&self, namespace: &str, name: &str) -> Option<Arc<AzureKeyVaultSecret>>;
}

impl ResourceLister for Store<AzureKeyVaultSecret> {
    fn get_resource(&self, namespace: &str, name: &str) -> Option<Arc<AzureKeyVaultSecret>> {
        Store::get(self, &ObjectRef::new(name).within(namespace))
    }
}

/// Namespaced reads and writes against the API server
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError>;
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError>;
    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError>;
    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, ClusterError>;
    async fn update_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, ClusterError>;

    /// Fresh copy of a declaring resource, bypassing the cache
    async fn get_declaring(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<AzureKeyVaultSecret, ClusterError>;

    /// Write the status of `resource`
    ///
    /// The write carries `resource`'s resource version, so a stale copy fails with
    /// [`ClusterError::Conflict`].
    async fn update_status(
        &self,
        resource: &AzureKeyVaultSecret,
    ) -> Result<AzureKeyVaultSecret, ClusterError>;
}

/// [`ClusterApi`] backed by a `kube::Client`
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl std::fmt::Debug for KubeClusterApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterApi").finish_non_exhaustive()
    }
}

impl KubeClusterApi {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn declaring(&self, namespace: &str) -> Api<AzureKeyVaultSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_name(name: Option<&String>) -> Result<&str, ClusterError> {
    name.map(String::as_str)
        .ok_or(ClusterError::MissingMetadata("name"))
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        self.secrets(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, "Secret", namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = object_name(secret.metadata.name.as_ref())?;
        self.secrets(namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| ClusterError::from_kube(e, "Secret", namespace, name))
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = object_name(secret.metadata.name.as_ref())?;
        self.secrets(namespace)
            .replace(name, &PostParams::default(), secret)
            .await
            .map_err(|e| ClusterError::from_kube(e, "Secret", namespace, name))
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError> {
        self.config_maps(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, "ConfigMap", namespace, name))
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, ClusterError> {
        let name = object_name(config_map.metadata.name.as_ref())?;
        self.config_maps(namespace)
            .create(&PostParams::default(), config_map)
            .await
            .map_err(|e| ClusterError::from_kube(e, "ConfigMap", namespace, name))
    }

    async fn update_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<ConfigMap, ClusterError> {
        let name = object_name(config_map.metadata.name.as_ref())?;
        self.config_maps(namespace)
            .replace(name, &PostParams::default(), config_map)
            .await
            .map_err(|e| ClusterError::from_kube(e, "ConfigMap", namespace, name))
    }

    async fn get_declaring(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<AzureKeyVaultSecret, ClusterError> {
        self.declaring(namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, "AzureKeyVaultSecret", namespace, name))
    }

    async fn update_status(
        &self,
        resource: &AzureKeyVaultSecret,
    ) -> Result<AzureKeyVaultSecret, ClusterError> {
        let name = object_name(resource.metadata.name.as_ref())?;
        let namespace = resource
            .metadata
            .namespace
            .as_deref()
            .ok_or(ClusterError::MissingMetadata("namespace"))?;
        let resource_version = resource
            .metadata
            .resource_version
            .as_deref()
            .ok_or(ClusterError::MissingMetadata("resourceVersion"))?;

        let patch = serde_json::json!({
            "metadata": { "resourceVersion": resource_version },
            "status": resource.status,
        });

        self.declaring(namespace)
            .patch_status(name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(patch))
            .await
            .map_err(|e| ClusterError::from_kube(e, "AzureKeyVaultSecret", namespace, name))
    }
}
