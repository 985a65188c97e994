//! # Watch Loop
//!
//! Watches `AzureKeyVaultSecret` resources, keeps the reflector store (the lister) current
//! and turns watch events into [`ResourceEvent`]s for the dispatcher.
//!
//! The previous cached copy is looked up before an event is applied to the store, so an
//! `Apply` for a known object becomes `Updated { old, new }` and an unknown one `Added`.
//! A resync timer replays every cached object as `Updated(obj, obj)`; identical resource
//! versions route it to the vault-drift queue.
//!
//! [`run_output_watch`] watches the metadata of the Secrets and ConfigMaps this controller
//! labels as its own, and reports deleted ones so they are recreated.

use crate::constants::{CONTROLLER_NAME, MANAGED_BY_LABEL};
use crate::controller::dispatch::{Dispatcher, ResourceEvent};
use crate::controller::server::ServerState;
use crate::crd::AzureKeyVaultSecret;
use crate::observability::metrics;
use futures::{pin_mut, StreamExt};
use kube::api::Api;
use kube::Resource;
use kube_runtime::reflector::store::Writer;
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{metadata_watcher, watcher, WatchStreamExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Turn one watcher event into dispatcher events, updating the store
///
/// `InitApply` events are buffered by the writer until `InitDone`, so the store keeps
/// serving the previous state while a relist is in progress.
pub fn apply_event(
    writer: &mut Writer<AzureKeyVaultSecret>,
    store: &Store<AzureKeyVaultSecret>,
    event: watcher::Event<AzureKeyVaultSecret>,
) -> Option<ResourceEvent> {
    let resource_event = match &event {
        watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
            let new = Arc::new(obj.clone());
            match store.get(&ObjectRef::from_obj(obj)) {
                Some(old) => Some(ResourceEvent::Updated { old, new }),
                None => Some(ResourceEvent::Added(new)),
            }
        }
        watcher::Event::Delete(obj) => Some(ResourceEvent::Deleted(Arc::new(obj.clone()))),
        watcher::Event::Init | watcher::Event::InitDone => None,
    };
    writer.apply_watcher_event(&event);
    resource_event
}

/// Replay every cached resource as an unchanged update
pub fn resync(store: &Store<AzureKeyVaultSecret>, dispatcher: &Dispatcher) -> usize {
    let cached = store.state();
    for obj in &cached {
        dispatcher.dispatch(&ResourceEvent::Updated {
            old: Arc::clone(obj),
            new: Arc::clone(obj),
        });
    }
    cached.len()
}

/// Run the watch until the stream ends
///
/// The server is marked ready once the initial list has been loaded into the store.
pub async fn run_watch_loop(
    api: Api<AzureKeyVaultSecret>,
    mut writer: Writer<AzureKeyVaultSecret>,
    dispatcher: Dispatcher,
    resync_period: Duration,
    server_state: Arc<ServerState>,
) {
    let store = writer.as_reader();
    let stream = watcher(api, watcher::Config::default()).default_backoff();
    pin_mut!(stream);

    let mut resync_timer = tokio::time::interval(resync_period);
    resync_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    resync_timer.tick().await;

    info!(
        resync_period_secs = resync_period.as_secs(),
        "Watching AzureKeyVaultSecret resources"
    );

    loop {
        tokio::select! {
            next = stream.next() => {
                match next {
                    Some(Ok(event)) => {
                        let init_done = matches!(event, watcher::Event::InitDone);
                        if let Some(resource_event) = apply_event(&mut writer, &store, event) {
                            dispatcher.dispatch(&resource_event);
                        }
                        if init_done && !server_state.ready() {
                            info!(cached = store.state().len(), "Initial AzureKeyVaultSecret list loaded");
                            server_state.set_ready(true);
                        }
                    }
                    Some(Err(e)) => {
                        metrics::increment_watch_errors();
                        warn!(error = %e, "AzureKeyVaultSecret watch error, the watcher will retry");
                    }
                    None => {
                        error!("AzureKeyVaultSecret watch stream ended");
                        break;
                    }
                }
            }
            _ = resync_timer.tick() => {
                let count = resync(&store, &dispatcher);
                debug!(count, "Resync of cached AzureKeyVaultSecret resources");
            }
        }
    }
}

/// Label selector matching the output objects this controller creates
#[must_use]
pub fn managed_output_selector() -> String {
    format!("{MANAGED_BY_LABEL}={CONTROLLER_NAME}")
}

/// Watch output objects of kind `K` and dispatch their deletion until the stream ends
///
/// Only metadata is watched; output payloads never pass through this loop.
pub async fn run_output_watch<K>(api: Api<K>, dispatcher: Dispatcher)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let kind = K::kind(&()).to_string();
    let config = watcher::Config::default().labels(&managed_output_selector());
    let stream = metadata_watcher(api, config).default_backoff();
    pin_mut!(stream);

    info!(kind = %kind, "Watching output objects for deletion");
    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Delete(obj)) => {
                dispatcher.dispatch_output_deleted(&kind, &obj.metadata);
            }
            Ok(_) => {}
            Err(e) => {
                metrics::increment_watch_errors();
                warn!(kind = %kind, error = %e, "Output watch error, the watcher will retry");
            }
        }
    }
    error!(kind = %kind, "Output watch stream ended");
}
