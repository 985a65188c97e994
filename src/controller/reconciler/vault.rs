//! Vault reconciler: propagates Key Vault content into the output objects.
//!
//! For each declared output the handler produces the desired data and its digest is
//! compared twice: with the digest recorded in status (and the output name recorded
//! there) and with the data the live output object holds. The object is rewritten only
//! when its data differs, and status only when the recorded digest differs. When both
//! match nothing is written.
//!
//! The output object is read on every pass, so an output that was deleted or replaced
//! is noticed even while the watch cache still shows a current status.

use super::{ensure_owned, owner_reference, Context, ReconcilerError};
use crate::controller::events::{actions, reasons, Severity};
use crate::controller::handlers::{handler_for, HandlerError, OutputHandler};
use crate::controller::hash::{config_map_digest, secret_digest};
use crate::controller::queue::split_key;
use crate::controller::status::{persist_status, StatusUpdate};
use crate::crd::{AzureKeyVaultSecret, ConfigMapOutput, SecretOutput};
use crate::observability::metrics;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::Resource;
use tracing::{debug, info};

/// Sync every declared output with the current Key Vault content
///
/// # Errors
/// Handler (vault or configuration) failures, ownership conflicts, a missing output
/// object, or any cluster failure
pub async fn reconcile_vault(ctx: &Context, key: &str) -> Result<(), ReconcilerError> {
    let (namespace, name) =
        split_key(key).ok_or_else(|| ReconcilerError::InvalidKey(key.to_string()))?;

    let Some(resource) = ctx.lister.get_resource(namespace, name) else {
        debug!(key, "AzureKeyVaultSecret no longer exists, skipping vault sync");
        return Ok(());
    };
    if !resource.has_output_defined() {
        return Ok(());
    }

    let handler = match handler_for(&resource, ctx.vault.as_ref()) {
        Ok(handler) => handler,
        Err(e) => return Err(handler_failure(ctx, &resource, e).await),
    };
    let owner = owner_reference(&resource)?;

    if let Some(output) = resource.secret_output() {
        sync_secret(ctx, &resource, key, handler.as_ref(), output, &owner).await?;
    }
    if let Some(output) = resource.config_map_output() {
        sync_config_map(ctx, &resource, key, handler.as_ref(), output, &owner).await?;
    }
    Ok(())
}

/// Record the failure on the resource and turn it into a reconciler error
async fn handler_failure(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    error: HandlerError,
) -> ReconcilerError {
    let reason = if error.is_malformed() {
        reasons::ERR_CONFIGURATION
    } else {
        reasons::ERR_AZURE_VAULT
    };
    ctx.recorder
        .record(
            &resource.object_ref(&()),
            Severity::Warning,
            reason,
            actions::SYNC_VAULT,
            error.to_string(),
        )
        .await;
    ReconcilerError::Handler(error)
}

fn output_missing(ctx: &Context, key: &str, kind: &'static str, namespace: &str, name: &str) -> ReconcilerError {
    // Recreating it is the structural pass's job
    ctx.structural_queue.add(key);
    ReconcilerError::OutputMissing {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

async fn sync_secret(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    key: &str,
    handler: &dyn OutputHandler,
    output: &SecretOutput,
    owner: &OwnerReference,
) -> Result<(), ReconcilerError> {
    let (namespace, name) =
        split_key(key).ok_or_else(|| ReconcilerError::InvalidKey(key.to_string()))?;

    let data = match handler.secret_data().await {
        Ok(data) => data,
        Err(e) => return Err(handler_failure(ctx, resource, e).await),
    };
    let digest = secret_digest(&data);

    let mut secret = match ctx.cluster.get_secret(namespace, &output.name).await {
        Ok(secret) => secret,
        Err(e) if e.is_not_found() => {
            return Err(output_missing(ctx, key, "Secret", namespace, &output.name));
        }
        Err(e) => return Err(e.into()),
    };
    ensure_owned(
        ctx,
        resource,
        owner,
        "Secret",
        &secret.metadata,
        actions::SYNC_VAULT,
    )
    .await?;

    let live = secret_digest(secret.data.iter().flatten().map(|(k, v)| (k, &v.0)));
    let status = resource.status.clone().unwrap_or_default();
    let recorded = status.secret_name.as_deref() == Some(output.name.as_str())
        && digest.matches(status.secret_hash.as_deref());
    let current = live == digest;
    if recorded && current {
        debug!(key, secret = %output.name, "Secret data unchanged");
        return Ok(());
    }

    if !current {
        secret.data = Some(
            data.into_iter()
                .map(|(data_key, value)| (data_key, ByteString(value)))
                .collect(),
        );
        secret.string_data = None;
        ctx.cluster.update_secret(namespace, &secret).await?;
        metrics::increment_outputs_updated("Secret");
        info!(key, secret = %output.name, hash = %digest, "Secret updated from Azure Key Vault");
    }

    // The cached status may still show a hash the structural pass has cleared
    persist_status(
        ctx.cluster.as_ref(),
        namespace,
        name,
        &StatusUpdate::Secret {
            name: output.name.clone(),
            hash: digest,
        },
    )
    .await?;

    if current {
        debug!(key, secret = %output.name, "Secret data already current, status recorded");
        return Ok(());
    }
    record_updated(ctx, resource, reasons::SECRET_UPDATED, "Secret", &output.name).await
}

async fn sync_config_map(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    key: &str,
    handler: &dyn OutputHandler,
    output: &ConfigMapOutput,
    owner: &OwnerReference,
) -> Result<(), ReconcilerError> {
    let (namespace, name) =
        split_key(key).ok_or_else(|| ReconcilerError::InvalidKey(key.to_string()))?;

    let data = match handler.config_map_data().await {
        Ok(data) => data,
        Err(e) => return Err(handler_failure(ctx, resource, e).await),
    };
    let digest = config_map_digest(&data);

    let mut config_map = match ctx.cluster.get_config_map(namespace, &output.name).await {
        Ok(config_map) => config_map,
        Err(e) if e.is_not_found() => {
            return Err(output_missing(ctx, key, "ConfigMap", namespace, &output.name));
        }
        Err(e) => return Err(e.into()),
    };
    ensure_owned(
        ctx,
        resource,
        owner,
        "ConfigMap",
        &config_map.metadata,
        actions::SYNC_VAULT,
    )
    .await?;

    let live = config_map_digest(config_map.data.iter().flatten());
    let status = resource.status.clone().unwrap_or_default();
    let recorded = status.config_map_name.as_deref() == Some(output.name.as_str())
        && digest.matches(status.config_map_hash.as_deref());
    let current = live == digest;
    if recorded && current {
        debug!(key, config_map = %output.name, "ConfigMap data unchanged");
        return Ok(());
    }

    if !current {
        config_map.data = Some(data);
        config_map.binary_data = None;
        ctx.cluster.update_config_map(namespace, &config_map).await?;
        metrics::increment_outputs_updated("ConfigMap");
        info!(key, config_map = %output.name, hash = %digest, "ConfigMap updated from Azure Key Vault");
    }

    persist_status(
        ctx.cluster.as_ref(),
        namespace,
        name,
        &StatusUpdate::ConfigMap {
            name: output.name.clone(),
            hash: digest,
        },
    )
    .await?;

    if current {
        debug!(key, config_map = %output.name, "ConfigMap data already current, status recorded");
        return Ok(());
    }
    record_updated(
        ctx,
        resource,
        reasons::CONFIG_MAP_UPDATED,
        "ConfigMap",
        &output.name,
    )
    .await
}

async fn record_updated(
    ctx: &Context,
    resource: &AzureKeyVaultSecret,
    reason: &str,
    kind: &str,
    output_name: &str,
) -> Result<(), ReconcilerError> {
    ctx.recorder
        .record(
            &resource.object_ref(&()),
            Severity::Normal,
            reason,
            actions::SYNC_VAULT,
            format!("{kind} {output_name} updated from Azure Key Vault"),
        )
        .await;
    Ok(())
}
