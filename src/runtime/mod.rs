//! # Runtime
//!
//! Wires the controller together: watch loop, dispatcher, the two work queues and their
//! worker pools.
//!
//! ```text
//! watcher ──► reflector store (lister)
//!    │
//!    └──► Dispatcher ──► structural queue ──► workers ──► reconcile_outputs
//!            ▲      └──► vault-drift queue ──► workers ──► reconcile_vault
//!            │
//! output watches (Secret, ConfigMap): deleted outputs
//! ```

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
pub mod workers;

use crate::config::ControllerConfig;
use crate::constants::{CONTROLLER_NAME, STRUCTURAL_QUEUE, VAULT_QUEUE};
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::cluster::KubeClusterApi;
use crate::controller::dispatch::Dispatcher;
use crate::controller::events::KubeEventRecorder;
use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::Context;
use crate::controller::server::ServerState;
use crate::crd::AzureKeyVaultSecret;
use crate::provider::VaultService;
use anyhow::Result;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::{Client, Resource};
use kube_runtime::reflector;
use std::sync::Arc;
use tracing::info;
use workers::{spawn_workers, SyncPass};

/// Run the controller until the watch ends or the process is interrupted
///
/// # Errors
/// Only setup failures; reconciliation errors are handled per key
pub async fn run(
    client: Client,
    vault: Arc<dyn VaultService>,
    config: &ControllerConfig,
    server_state: Arc<ServerState>,
) -> Result<()> {
    let namespace = config.watch_namespace.as_deref();
    let api: Api<AzureKeyVaultSecret> = scoped_api(&client, namespace);
    let (store, writer) = reflector::store();

    let backoff = ExponentialBackoff::new(config.backoff_base(), config.backoff_max());
    let structural_queue = WorkQueue::new(STRUCTURAL_QUEUE, backoff);
    let vault_queue = WorkQueue::new(VAULT_QUEUE, backoff);

    let ctx = Arc::new(Context {
        lister: Arc::new(store),
        cluster: Arc::new(KubeClusterApi::new(client.clone())),
        vault,
        recorder: Arc::new(KubeEventRecorder::new(client.clone(), CONTROLLER_NAME)),
        vault_queue: Arc::clone(&vault_queue),
        structural_queue: Arc::clone(&structural_queue),
    });

    let mut handles = spawn_workers(
        &structural_queue,
        &ctx,
        SyncPass::Outputs,
        config.structural_workers,
        config.max_retries,
    );
    handles.extend(spawn_workers(
        &vault_queue,
        &ctx,
        SyncPass::Vault,
        config.vault_workers,
        config.max_retries,
    ));

    let dispatcher = Dispatcher::new(Arc::clone(&structural_queue), Arc::clone(&vault_queue));
    let output_watches = [
        tokio::spawn(watch_loop::run_output_watch(
            scoped_api::<Secret>(&client, namespace),
            dispatcher.clone(),
        )),
        tokio::spawn(watch_loop::run_output_watch(
            scoped_api::<ConfigMap>(&client, namespace),
            dispatcher.clone(),
        )),
    ];
    let watch = watch_loop::run_watch_loop(
        api,
        writer,
        dispatcher,
        config.resync_period(),
        Arc::clone(&server_state),
    );

    tokio::select! {
        () = watch => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping controller");
        }
    }

    server_state.set_ready(false);
    for output_watch in &output_watches {
        output_watch.abort();
    }
    structural_queue.shut_down();
    vault_queue.shut_down();
    for handle in handles {
        // In-flight passes finish before their worker exits
        let _ = handle.await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Api for one namespace, or for all namespaces when none is configured
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}
