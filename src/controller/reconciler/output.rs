//! Output reconciler: existence and ownership of the output objects.

use super::{ensure_owned, owner_reference, Context, ReconcilerError};
use crate::constants::{
    CONTROLLER_NAME, DOCKER_CONFIG_JSON_KEY, MANAGED_BY_LABEL, SECRET_TYPE_DOCKER_CONFIG_JSON,
    SECRET_TYPE_TLS, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY,
};
use crate::controller::events::{actions, reasons, Severity};
use crate::controller::queue::split_key;
use crate::controller::status::{persist_status, StatusUpdate};
use crate::crd::AzureKeyVaultSecret;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::Resource;
use std::collections::BTreeMap;
use tracing::{debug, info};

fn output_meta(namespace: &str, name: &str, owner: &OwnerReference) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        owner_references: Some(vec![owner.clone()]),
        labels: Some(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            CONTROLLER_NAME.to_string(),
        )])),
        ..Default::default()
    }
}

/// Data a new Secret of `secret_type` must carry for the API server to accept it
///
/// The values are placeholders; the vault pass replaces them.
fn placeholder_data(secret_type: &str) -> Option<BTreeMap<String, ByteString>> {
    let keys: &[(&str, &[u8])] = match secret_type {
        SECRET_TYPE_TLS => &[(TLS_CERT_KEY, b""), (TLS_PRIVATE_KEY_KEY, b"")],
        SECRET_TYPE_DOCKER_CONFIG_JSON => &[(DOCKER_CONFIG_JSON_KEY, b"{}")],
        _ => return None,
    };
    Some(
        keys.iter()
            .map(|(key, value)| ((*key).to_string(), ByteString(value.to_vec())))
            .collect(),
    )
}

/// Make sure every output the resource declares exists and is owned by it
///
/// Newly created outputs hold no vault data; their status hash is cleared and the key is queued
/// on the vault-drift queue so the data follows right away.
///
/// # Errors
/// [`ReconcilerError::NotOwned`] on a naming collision, or any cluster failure
pub async fn reconcile_outputs(ctx: &Context, key: &str) -> Result<(), ReconcilerError> {
    let (namespace, name) =
        split_key(key).ok_or_else(|| ReconcilerError::InvalidKey(key.to_string()))?;

    let Some(resource) = ctx.lister.get_resource(namespace, name) else {
        debug!(key, "AzureKeyVaultSecret no longer exists, nothing to reconcile");
        return Ok(());
    };
    if !resource.has_output_defined() {
        debug!(key, "AzureKeyVaultSecret has no output, nothing to reconcile");
        return Ok(());
    }

    let owner = owner_reference(&resource)?;

    if let Some(output) = resource.secret_output() {
        ensure_secret(ctx, &resource, key, namespace, &output.name, &owner).await?;
    }
    if let Some(output) = resource.config_map_output() {
        ensure_config_map(ctx, &resource, key, namespace, &output.name, &owner).await?;
    }

    ctx.recorder
        .record(
            &resource.object_ref(&()),
            Severity::Normal,
            reasons::SYNCED,
            actions::RECONCILE_OUTPUT,
            "AzureKeyVaultSecret synced successfully".to_string(),
        )
        .await;
    Ok(())
}

async fn ensure_secret(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    key: &str,
    namespace: &str,
    output_name: &str,
    owner: &OwnerReference,
) -> Result<(), ReconcilerError> {
    let secret = match ctx.cluster.get_secret(namespace, output_name).await {
        Ok(secret) => secret,
        Err(e) if e.is_not_found() => {
            let secret_type = resource.secret_type();
            let secret = Secret {
                metadata: output_meta(namespace, output_name, owner),
                type_: Some(secret_type.to_string()),
                data: placeholder_data(secret_type),
                ..Default::default()
            };
            let created = ctx.cluster.create_secret(namespace, &secret).await?;
            metrics::increment_outputs_created("Secret");
            info!(key, secret = output_name, "Created output Secret");
            on_output_created(ctx, key, StatusUpdate::InvalidateSecret).await?;
            created
        }
        Err(e) => return Err(e.into()),
    };

    ensure_owned(
        ctx,
        resource,
        owner,
        "Secret",
        &secret.metadata,
        actions::RECONCILE_OUTPUT,
    )
    .await
}

async fn ensure_config_map(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    key: &str,
    namespace: &str,
    output_name: &str,
    owner: &OwnerReference,
) -> Result<(), ReconcilerError> {
    let config_map = match ctx.cluster.get_config_map(namespace, output_name).await {
        Ok(config_map) => config_map,
        Err(e) if e.is_not_found() => {
            let config_map = ConfigMap {
                metadata: output_meta(namespace, output_name, owner),
                ..Default::default()
            };
            let created = ctx.cluster.create_config_map(namespace, &config_map).await?;
            metrics::increment_outputs_created("ConfigMap");
            info!(key, config_map = output_name, "Created output ConfigMap");
            on_output_created(ctx, key, StatusUpdate::InvalidateConfigMap).await?;
            created
        }
        Err(e) => return Err(e.into()),
    };

    ensure_owned(
        ctx,
        resource,
        owner,
        "ConfigMap",
        &config_map.metadata,
        actions::RECONCILE_OUTPUT,
    )
    .await
}

/// A fresh output is empty, so the recorded hash no longer describes it
async fn on_output_created(
    ctx: &Context,
    key: &str,
    invalidate: StatusUpdate,
) -> Result<(), ReconcilerError> {
    let (namespace, name) =
        split_key(key).ok_or_else(|| ReconcilerError::InvalidKey(key.to_string()))?;
    persist_status(ctx.cluster.as_ref(), namespace, name, &invalidate).await?;
    ctx.vault_queue.add(key);
    Ok(())
}
