//! # Error Policy
//!
//! What happens to a key after a reconciliation pass.
//!
//! - Success forgets the key's failure count and any delayed retry.
//! - Failure re-queues the key with per-key exponential backoff until `max_retries`
//!   requeues have happened; after that the key is dropped until the next resync or event.

use crate::controller::queue::WorkQueue;
use crate::controller::reconciler::ReconcilerError;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// What the policy did with a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced,
    Requeued(Duration),
    Dropped,
}

/// Apply the retry policy to the result of one pass over `key`
pub fn handle_sync_result(
    queue: &Arc<WorkQueue>,
    key: &str,
    result: Result<(), ReconcilerError>,
    max_retries: u32,
) -> SyncOutcome {
    let error = match result {
        Ok(()) => {
            queue.forget(key);
            debug!(queue = queue.name(), key, "Successfully synced");
            return SyncOutcome::Synced;
        }
        Err(e) => e,
    };

    metrics::increment_reconciliation_errors(queue.name());

    if error.is_malformed() {
        // Retried like any other failure, but it will not succeed until the resource is fixed
        error!(
            queue = queue.name(),
            key,
            error = %error,
            "AzureKeyVaultSecret configuration is invalid"
        );
    } else if error.is_conflict() {
        warn!(queue = queue.name(), key, error = %error, "Output name collision");
    } else {
        warn!(queue = queue.name(), key, error = %error, "Error syncing AzureKeyVaultSecret");
    }

    let requeues = queue.num_requeues(key);
    if requeues < max_retries {
        let delay = queue.add_rate_limited(key);
        metrics::increment_requeues(queue.name());
        debug!(
            queue = queue.name(),
            key,
            attempt = requeues + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Requeued with backoff"
        );
        return SyncOutcome::Requeued(delay);
    }

    queue.forget(key);
    metrics::increment_dropped_keys(queue.name());
    error!(
        queue = queue.name(),
        key,
        retries = requeues,
        error = %error,
        "Dropping key out of the queue after repeated failures"
    );
    SyncOutcome::Dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::backoff::ExponentialBackoff;

    fn queue() -> Arc<WorkQueue> {
        WorkQueue::new(
            "test-policy",
            ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1)),
        )
    }

    fn failure() -> Result<(), ReconcilerError> {
        Err(ReconcilerError::OutputMissing {
            kind: "Secret",
            namespace: "ns".to_string(),
            name: "foo-secret".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_back_off_then_drop() {
        let q = queue();
        assert_eq!(
            handle_sync_result(&q, "ns/foo", failure(), 2),
            SyncOutcome::Requeued(Duration::from_millis(5))
        );
        assert_eq!(
            handle_sync_result(&q, "ns/foo", failure(), 2),
            SyncOutcome::Requeued(Duration::from_millis(10))
        );
        assert_eq!(handle_sync_result(&q, "ns/foo", failure(), 2), SyncOutcome::Dropped);
        assert_eq!(q.num_requeues("ns/foo"), 0);
        assert!(!q.has_pending_retry("ns/foo"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_forgets_pending_retry() {
        let q = queue();
        handle_sync_result(&q, "ns/foo", failure(), 5);
        assert!(q.has_pending_retry("ns/foo"));

        assert_eq!(handle_sync_result(&q, "ns/foo", Ok(()), 5), SyncOutcome::Synced);
        assert!(!q.has_pending_retry("ns/foo"));
        assert_eq!(q.num_requeues("ns/foo"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_errors_are_still_retried() {
        let q = queue();
        let result = Err(ReconcilerError::InvalidKey("bad".to_string()));
        assert!(matches!(
            handle_sync_result(&q, "bad", result, 5),
            SyncOutcome::Requeued(_)
        ));
    }
}
