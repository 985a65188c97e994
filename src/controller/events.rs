//! # Event Recording
//!
//! Kubernetes Events on the declaring `AzureKeyVaultSecret`, visible with
//! `kubectl describe akvs`.
//!
//! Recording is fire-and-forget: a failed event is logged and never changes the outcome
//! of a reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Event reasons, shown in the REASON column
pub mod reasons {
    /// Output exists and is owned by the resource
    pub const SYNCED: &str = "Synced";
    /// Output name is taken by an object the resource does not own
    pub const ERR_RESOURCE_EXISTS: &str = "ErrResourceExists";
    /// Key Vault read failed
    pub const ERR_AZURE_VAULT: &str = "ErrAzureVault";
    /// Resource configuration cannot be processed (object type, transform, dataKey)
    pub const ERR_CONFIGURATION: &str = "ErrConfiguration";
    /// Secret data refreshed from Key Vault
    pub const SECRET_UPDATED: &str = "SecretUpdated";
    /// ConfigMap data refreshed from Key Vault
    pub const CONFIG_MAP_UPDATED: &str = "ConfigMapUpdated";
}

/// Event actions, shown in the ACTION column
pub mod actions {
    /// Output existence and ownership
    pub const RECONCILE_OUTPUT: &str = "ReconcileOutput";
    /// Key Vault content propagation
    pub const SYNC_VAULT: &str = "SyncVault";
}

/// Severity of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
}

impl From<Severity> for EventType {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Normal => EventType::Normal,
            Severity::Warning => EventType::Warning,
        }
    }
}

/// Records Events against the declaring resource
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(
        &self,
        object: &ObjectReference,
        severity: Severity,
        reason: &str,
        action: &str,
        message: String,
    );
}

/// Recorder backed by `kube::runtime::events::Recorder`
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventRecorder").finish_non_exhaustive()
    }
}

impl KubeEventRecorder {
    /// `controller_name` is reported as the event's reporting component
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(
        &self,
        object: &ObjectReference,
        severity: Severity,
        reason: &str,
        action: &str,
        message: String,
    ) {
        let event = Event {
            type_: severity.into(),
            reason: reason.to_string(),
            note: Some(message),
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, object).await {
            warn!(
                reason,
                action,
                object.name = object.name.as_deref().unwrap_or_default(),
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_maps_to_event_type() {
        assert_eq!(EventType::from(Severity::Normal), EventType::Normal);
        assert_eq!(EventType::from(Severity::Warning), EventType::Warning);
    }

    #[test]
    fn test_reasons() {
        assert_eq!(reasons::ERR_RESOURCE_EXISTS, "ErrResourceExists");
        assert_eq!(reasons::ERR_AZURE_VAULT, "ErrAzureVault");
        assert_eq!(reasons::SYNCED, "Synced");
    }
}
