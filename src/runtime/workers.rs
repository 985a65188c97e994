//! # Workers
//!
//! Tokio tasks draining the two work queues. Each worker takes one key at a time, runs the
//! pass for its queue and hands the result to the error policy.

use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::{reconcile_outputs, reconcile_vault, Context, ReconcilerError};
use crate::observability::metrics;
use crate::runtime::error_policy::handle_sync_result;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

/// Reconciliation pass run by a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPass {
    /// Output existence and ownership
    Outputs,
    /// Key Vault content propagation
    Vault,
}

impl SyncPass {
    /// Run the pass for one key
    ///
    /// # Errors
    /// Whatever the pass returns
    pub async fn run(self, ctx: &Context, key: &str) -> Result<(), ReconcilerError> {
        match self {
            Self::Outputs => reconcile_outputs(ctx, key).await,
            Self::Vault => reconcile_vault(ctx, key).await,
        }
    }
}

/// Process keys until the queue shuts down
pub async fn run_worker(
    queue: Arc<WorkQueue>,
    ctx: Arc<Context>,
    pass: SyncPass,
    max_retries: u32,
) {
    while let Some(key) = queue.get().await {
        let span = tracing::info_span!("controller.sync", queue = queue.name(), key = %key);
        let started = Instant::now();
        metrics::increment_reconciliations(queue.name());

        let result = pass.run(&ctx, &key).instrument(span.clone()).await;

        metrics::observe_reconciliation_duration(queue.name(), started.elapsed().as_secs_f64());
        span.in_scope(|| handle_sync_result(&queue, &key, result, max_retries));
        queue.done(&key);
    }
    debug!(queue = queue.name(), "Worker stopped");
}

/// Start `count` workers on `queue`
pub fn spawn_workers(
    queue: &Arc<WorkQueue>,
    ctx: &Arc<Context>,
    pass: SyncPass,
    count: usize,
    max_retries: u32,
) -> Vec<JoinHandle<()>> {
    info!(queue = queue.name(), workers = count, "Starting workers");
    (0..count.max(1))
        .map(|_| {
            tokio::spawn(run_worker(
                Arc::clone(queue),
                Arc::clone(ctx),
                pass,
                max_retries,
            ))
        })
        .collect()
}
