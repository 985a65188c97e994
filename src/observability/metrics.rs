//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `keyvault_controller_reconciliations_total{queue}` - Reconciliation passes per queue
//! - `keyvault_controller_reconciliation_errors_total{queue}` - Failed passes per queue
//! - `keyvault_controller_reconciliation_duration_seconds{queue}` - Duration of a pass
//! - `keyvault_controller_requeues_total{queue}` - Rate-limited requeues
//! - `keyvault_controller_dropped_keys_total{queue}` - Keys dropped after exhausting retries
//! - `keyvault_controller_queue_depth{queue}` - Keys waiting in each queue
//! - `keyvault_controller_outputs_created_total{kind}` - Secrets/ConfigMaps created
//! - `keyvault_controller_outputs_updated_total{kind}` - Secrets/ConfigMaps written with new data
//! - `keyvault_controller_ownership_conflicts_total{kind}` - Outputs owned by something else
//! - `keyvault_controller_vault_fetches_total{object_type}` - Key Vault reads
//! - `keyvault_controller_vault_fetch_errors_total{object_type}` - Failed Key Vault reads
//! - `keyvault_controller_vault_fetch_duration_seconds{object_type}` - Key Vault read latency
//! - `keyvault_controller_status_conflicts_total` - Optimistic concurrency retries on status
//! - `keyvault_controller_watch_errors_total` - Errors surfaced by the watch stream

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_reconciliations_total",
            "Total number of reconciliation passes by queue",
        ),
        &["queue"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_reconciliation_errors_total",
            "Total number of failed reconciliation passes by queue",
        ),
        &["queue"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "keyvault_controller_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds by queue",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["queue"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_requeues_total",
            "Total number of rate-limited requeues by queue",
        ),
        &["queue"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static DROPPED_KEYS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_dropped_keys_total",
            "Total number of keys dropped after exhausting their retries, by queue",
        ),
        &["queue"],
    )
    .expect("Failed to create DROPPED_KEYS_TOTAL metric - this should never happen")
});

static QUEUE_DEPTH: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "keyvault_controller_queue_depth",
            "Current number of keys waiting in each queue",
        ),
        &["queue"],
    )
    .expect("Failed to create QUEUE_DEPTH metric - this should never happen")
});

static OUTPUTS_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_outputs_created_total",
            "Total number of output objects created by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create OUTPUTS_CREATED_TOTAL metric - this should never happen")
});

static OUTPUTS_UPDATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_outputs_updated_total",
            "Total number of output objects updated from Key Vault by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create OUTPUTS_UPDATED_TOTAL metric - this should never happen")
});

static OWNERSHIP_CONFLICTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_ownership_conflicts_total",
            "Total number of output objects found owned by another resource, by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create OWNERSHIP_CONFLICTS_TOTAL metric - this should never happen")
});

static VAULT_FETCHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_vault_fetches_total",
            "Total number of Key Vault reads by object type",
        ),
        &["object_type"],
    )
    .expect("Failed to create VAULT_FETCHES_TOTAL metric - this should never happen")
});

static VAULT_FETCH_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "keyvault_controller_vault_fetch_errors_total",
            "Total number of failed Key Vault reads by object type",
        ),
        &["object_type"],
    )
    .expect("Failed to create VAULT_FETCH_ERRORS_TOTAL metric - this should never happen")
});

static VAULT_FETCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "keyvault_controller_vault_fetch_duration_seconds",
            "Duration of Key Vault reads in seconds by object type",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["object_type"],
    )
    .expect("Failed to create VAULT_FETCH_DURATION metric - this should never happen")
});

static STATUS_CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_controller_status_conflicts_total",
        "Total number of status writes retried after a resource version conflict",
    )
    .expect("Failed to create STATUS_CONFLICTS_TOTAL metric - this should never happen")
});

static WATCH_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "keyvault_controller_watch_errors_total",
        "Total number of errors surfaced by the AzureKeyVaultSecret watch stream",
    )
    .expect("Failed to create WATCH_ERRORS_TOTAL metric - this should never happen")
});

/// Register all metrics with the registry
///
/// # Errors
/// Returns an error if a metric is registered twice
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DROPPED_KEYS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    REGISTRY.register(Box::new(OUTPUTS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OUTPUTS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OWNERSHIP_CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_FETCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_FETCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_FETCH_DURATION.clone()))?;
    REGISTRY.register(Box::new(STATUS_CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_ERRORS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(queue: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[queue]).inc();
}

pub fn increment_reconciliation_errors(queue: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[queue]).inc();
}

pub fn observe_reconciliation_duration(queue: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[queue])
        .observe(duration);
}

pub fn increment_requeues(queue: &str) {
    REQUEUES_TOTAL.with_label_values(&[queue]).inc();
}

pub fn increment_dropped_keys(queue: &str) {
    DROPPED_KEYS_TOTAL.with_label_values(&[queue]).inc();
}

pub fn set_queue_depth(queue: &str, depth: usize) {
    QUEUE_DEPTH
        .with_label_values(&[queue])
        .set(i64::try_from(depth).unwrap_or(i64::MAX));
}

pub fn increment_outputs_created(kind: &str) {
    OUTPUTS_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_outputs_updated(kind: &str) {
    OUTPUTS_UPDATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_ownership_conflicts(kind: &str) {
    OWNERSHIP_CONFLICTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a completed Key Vault read
pub fn record_vault_fetch(object_type: &str, duration: f64) {
    VAULT_FETCHES_TOTAL.with_label_values(&[object_type]).inc();
    VAULT_FETCH_DURATION
        .with_label_values(&[object_type])
        .observe(duration);
}

pub fn increment_vault_fetch_errors(object_type: &str) {
    VAULT_FETCH_ERRORS_TOTAL
        .with_label_values(&[object_type])
        .inc();
}

pub fn increment_status_conflicts() {
    STATUS_CONFLICTS_TOTAL.inc();
}

pub fn increment_watch_errors() {
    WATCH_ERRORS_TOTAL.inc();
}
