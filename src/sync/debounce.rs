//! Per-key write coalescing.
//!
//! Each key has at most one pending action. Scheduling under a key that is
//! already pending aborts the old timer and replaces the action; the newest
//! action fires once the key has been quiet for the whole window. An action
//! that has started running is never cancelled.

use crate::store::Collection;
use crate::types::Id;
use futures::future::{BoxFuture, join_all};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Identity of a debounced write: one column of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteKey {
    pub collection: Collection,
    pub id: Id,
    pub column: String,
}

impl WriteKey {
    pub fn new(collection: Collection, id: Id, column: impl Into<String>) -> Self {
        Self {
            collection,
            id,
            column: column.into(),
        }
    }
}

struct Pending {
    generation: u64,
    action: BoxFuture<'static, ()>,
    timer: JoinHandle<()>,
}

struct Shared {
    window: Duration,
    generation: AtomicU64,
    pending: Mutex<HashMap<WriteKey, Pending>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, HashMap<WriteKey, Pending>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the action for `key` only if it is still the one this timer was armed for.
    fn take_if_current(&self, key: &WriteKey, generation: u64) -> Option<BoxFuture<'static, ()>> {
        let mut pending = self.lock();
        match pending.get(key) {
            Some(entry) if entry.generation == generation => {
                pending.remove(key).map(|entry| entry.action)
            }
            _ => None,
        }
    }
}

/// Coalesces writes per key over a quiescence window.
#[derive(Clone)]
pub struct Debouncer {
    shared: Arc<Shared>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                window,
                generation: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    /// Arm `action` under `key`, replacing any pending action for the same key.
    ///
    /// Returns true if a pending action was replaced. Must be called from
    /// within a tokio runtime.
    pub fn schedule<F>(&self, key: WriteKey, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.shared.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // Hold the map while arming so the timer cannot look before the entry exists.
        let mut pending = self.shared.lock();
        let shared = Arc::clone(&self.shared);
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(shared.window).await;
            if let Some(action) = shared.take_if_current(&timer_key, generation) {
                debug!(key = ?timer_key, "debounce window elapsed, writing");
                action.await;
            }
        });

        let replaced = pending.insert(
            key,
            Pending {
                generation,
                action: Box::pin(action),
                timer,
            },
        );
        match replaced {
            Some(previous) => {
                previous.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Drop every pending write for one record. Returns how many were dropped.
    pub fn cancel_record(&self, collection: Collection, id: Id) -> usize {
        let mut pending = self.shared.lock();
        let keys: Vec<WriteKey> = pending
            .keys()
            .filter(|k| k.collection == collection && k.id == id)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = pending.remove(key) {
                entry.timer.abort();
            }
        }
        keys.len()
    }

    /// Number of writes waiting for their window to elapse.
    pub fn pending(&self) -> usize {
        self.shared.lock().len()
    }

    /// Run every pending write now and wait for all of them.
    pub async fn flush(&self) {
        let actions: Vec<BoxFuture<'static, ()>> = {
            let mut pending = self.shared.lock();
            pending
                .drain()
                .map(|(_, entry)| {
                    entry.timer.abort();
                    entry.action
                })
                .collect()
        };
        if !actions.is_empty() {
            debug!(count = actions.len(), "flushing debounced writes");
            join_all(actions).await;
        }
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.shared.window)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn key(column: &str) -> WriteKey {
        WriteKey::new(Collection::Tasks, Id(1), column)
    }

    fn recorder() -> Arc<StdMutex<Vec<String>>> {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn push(log: &Arc<StdMutex<Vec<String>>>, value: &str) -> impl Future<Output = ()> + Send + 'static {
        let log = Arc::clone(log);
        let value = value.to_string();
        async move { log.lock().unwrap().push(value) }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_to_last_value() {
        let debouncer = Debouncer::new(Duration::from_millis(1000));
        let log = recorder();

        assert!(!debouncer.schedule(key("title"), push(&log, "a")));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(debouncer.schedule(key("title"), push(&log, "ab")));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(debouncer.schedule(key("title"), push(&log, "abc")));

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(log.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*log.lock().unwrap(), vec!["abc".to_string()]);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_fire_independently() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let log = recorder();

        debouncer.schedule(key("title"), push(&log, "t"));
        debouncer.schedule(key("description"), push(&log, "d"));
        assert_eq!(debouncer.pending(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut seen = log.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["d".to_string(), "t".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_pending_immediately() {
        let debouncer = Debouncer::new(Duration::from_secs(60));
        let log = recorder();

        debouncer.schedule(key("title"), push(&log, "x"));
        debouncer.flush().await;
        assert_eq!(*log.lock().unwrap(), vec!["x".to_string()]);

        // the aborted timer must not fire a second time
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_record_drops_only_that_record() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let log = recorder();

        debouncer.schedule(key("title"), push(&log, "gone"));
        debouncer.schedule(WriteKey::new(Collection::Tasks, Id(2), "title"), push(&log, "kept"));
        assert_eq!(debouncer.cancel_record(Collection::Tasks, Id(1)), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*log.lock().unwrap(), vec!["kept".to_string()]);
    }
}
