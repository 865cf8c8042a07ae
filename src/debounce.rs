//! Debounced task scheduling — one pending cancellable task per key.
//!
//! Text inputs validate once per typing pause instead of on every
//! keystroke: scheduling a task for a key aborts the key's pending task, so
//! only the last schedule within the quiet window ever fires.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Per-key debounced scheduler.
pub struct Debouncer {
    window: Duration,
    pending: HashMap<String, JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Schedule `task` to run after the quiet window, replacing any pending
    /// task for the same key.
    pub fn schedule<F, Fut>(&mut self, key: &str, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.prune_finished();
        if let Some(previous) = self.pending.remove(key) {
            previous.abort();
            tracing::debug!(key = %key, "Superseded pending debounced task");
        }
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            task().await;
        });
        self.pending.insert(key.to_string(), handle);
    }

    /// Cancel the pending task for a key, if any.
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel everything (session reset).
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }

    /// Number of keys with a task still pending.
    pub fn pending_count(&mut self) -> usize {
        self.prune_finished();
        self.pending.len()
    }

    fn prune_finished(&mut self) {
        self.pending.retain(|_, handle| !handle.is_finished());
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
