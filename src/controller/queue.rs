//! # Work Queue
//!
//! De-duplicating, rate-limited work queue of `namespace/name` keys.
//!
//! Semantics:
//! - A key is pending at most once; adding a pending key is a no-op.
//! - A key handed out by [`WorkQueue::get`] is "processing" until [`WorkQueue::done`].
//!   Adding it meanwhile marks it dirty and it is queued again on `done`, so one key is
//!   never processed by two workers at once.
//! - [`WorkQueue::add_rate_limited`] re-adds a key after a per-key exponential delay.
//!   [`WorkQueue::forget`] clears the failure count and cancels a pending delayed add.
//!   Every delayed add carries a generation; a timer that already fired only adds its key
//!   if its generation is still the pending one, so a cancellation can never lose a race
//!   against it.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an `.await`.

use crate::controller::backoff::ExponentialBackoff;
use crate::observability::metrics;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::trace;

/// Build the queue key of a resource
#[must_use]
pub fn work_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Split a queue key into namespace and name
///
/// Returns `None` unless the key has exactly one `/` with text on both sides.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    let (namespace, name) = key.split_once('/')?;
    if namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((namespace, name))
}

#[derive(Debug)]
struct DelayedAdd {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    delayed: HashMap<String, DelayedAdd>,
    next_generation: u64,
    shutting_down: bool,
}

/// Work queue shared by the event dispatcher (producer) and one worker pool (consumers)
#[derive(Debug)]
pub struct WorkQueue {
    name: &'static str,
    backoff: ExponentialBackoff,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    #[must_use]
    pub fn new(name: &'static str, backoff: ExponentialBackoff) -> Arc<Self> {
        Arc::new(Self {
            name,
            backoff,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        })
    }

    /// Queue name, used in logs and metric labels
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_locked(&self, state: &mut QueueState, key: &str) {
        if state.shutting_down || state.dirty.contains(key) {
            return;
        }
        state.dirty.insert(key.to_string());
        if state.processing.contains(key) {
            trace!(queue = self.name, key, "Key is being processed, deferring");
            return;
        }
        state.queue.push_back(key.to_string());
        metrics::set_queue_depth(self.name, state.queue.len());
        self.notify.notify_one();
    }

    /// Queue a key for processing
    pub fn add(&self, key: &str) {
        let mut state = self.lock();
        self.add_locked(&mut state, key);
    }

    /// Queue a key after its backoff delay and count the failure
    ///
    /// Returns the delay that was applied.
    pub fn add_rate_limited(self: &Arc<Self>, key: &str) -> Duration {
        let mut state = self.lock();
        if state.shutting_down {
            return Duration::ZERO;
        }
        let failures = state.failures.entry(key.to_string()).or_insert(0);
        let delay = self.backoff.delay_for(*failures);
        *failures = failures.saturating_add(1);

        if state.delayed.contains_key(key) {
            // An earlier delayed add fires first
            return delay;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let queue = Arc::clone(self);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.fire_delayed(&owned_key, generation);
        });
        state
            .delayed
            .insert(key.to_string(), DelayedAdd { generation, handle });
        delay
    }

    /// Complete a delayed add unless it was cancelled or replaced meanwhile
    fn fire_delayed(&self, key: &str, generation: u64) {
        let mut state = self.lock();
        // `forget` may have run between the timer firing and this lock
        if state.delayed.get(key).map(|delayed| delayed.generation) != Some(generation) {
            trace!(queue = self.name, key, "Delayed add was cancelled");
            return;
        }
        state.delayed.remove(key);
        self.add_locked(&mut state, key);
    }

    /// Clear the failure count of a key and cancel its pending delayed add
    pub fn forget(&self, key: &str) {
        let mut state = self.lock();
        state.failures.remove(key);
        if let Some(delayed) = state.delayed.remove(key) {
            delayed.handle.abort();
        }
    }

    /// Number of rate-limited requeues since the key was last forgotten
    #[must_use]
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Whether a delayed add is pending for the key
    #[must_use]
    pub fn has_pending_retry(&self, key: &str) -> bool {
        self.lock().delayed.contains_key(key)
    }

    /// Next key to process, waiting until one is available
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    metrics::set_queue_depth(self.name, state.queue.len());
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark a key as processed; a key re-added meanwhile is queued again
    pub fn done(&self, key: &str) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.to_string());
            metrics::set_queue_depth(self.name, state.queue.len());
            self.notify.notify_one();
        }
    }

    /// Stop handing out keys and cancel every delayed add
    pub fn shut_down(&self) {
        let mut state = self.lock();
        state.shutting_down = true;
        for (_, delayed) in state.delayed.drain() {
            delayed.handle.abort();
        }
        drop(state);
        self.notify.notify_waiters();
    }

    /// Number of keys waiting to be handed out
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
