// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of running background workers, keyed by rule or operation id.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Control surface of one spawned worker.
pub struct WorkerHandle {
    cancel: CancellationToken,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
    generation: u64,
}

impl WorkerHandle {
    pub fn new(cancel: CancellationToken, wake: Arc<Notify>, task: JoinHandle<()>) -> Self {
        Self {
            cancel,
            wake,
            task,
            generation: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the worker to stop before its next work item.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Interrupts the worker's idle wait, or pre-arms the next one.
    pub fn wake(&self) {
        self.wake.notify_one();
    }
}

/// Owns the handles of every worker of one kind.
///
/// Long-lived workers never see the registry; they only hold their own
/// cancellation token and wake signal. Transient workers remove their own
/// entry on exit, matched by generation so a replacement is never evicted.
pub struct WorkerRegistry<K> {
    workers: DashMap<K, WorkerHandle>,
    next_generation: AtomicU64,
}

impl<K> Default for WorkerRegistry<K>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> WorkerRegistry<K>
where
    K: Eq + Hash + Copy + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            workers: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Registers a worker, cancelling any previous worker under the same key.
    ///
    /// Returns the generation assigned to the new entry.
    pub fn insert(&self, key: K, mut handle: WorkerHandle) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        handle.generation = generation;
        if let Some(old) = self.workers.insert(key, handle) {
            debug!(?key, "replacing running worker");
            old.cancel();
        }
        generation
    }

    /// Spawns a self-terminating worker that drops its entry once `work`
    /// returns. `work` starts only after the entry is registered.
    pub fn spawn_transient<F>(self: &Arc<Self>, key: K, cancel: CancellationToken, work: F)
    where
        K: Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let (registered_tx, registered_rx) = oneshot::channel::<u64>();
        let registry = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let Ok(generation) = registered_rx.await else {
                return;
            };
            work.await;
            if let Some(registry) = registry.upgrade() {
                registry
                    .workers
                    .remove_if(&key, |_, h| h.generation == generation);
            }
        });
        let generation = self.insert(key, WorkerHandle::new(cancel, Arc::new(Notify::new()), task));
        let _ = registered_tx.send(generation);
    }

    /// Cancels and forgets the worker. Returns whether one was registered.
    pub fn remove(&self, key: &K) -> bool {
        match self.workers.remove(key) {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Interrupts the worker's idle wait. Returns whether one was registered.
    pub fn wake(&self, key: &K) -> bool {
        match self.workers.get(key) {
            Some(handle) => {
                handle.wake();
                true
            }
            None => false,
        }
    }

    /// Registered and neither cancelled nor finished.
    pub fn is_running(&self, key: &K) -> bool {
        self.workers
            .get(key)
            .is_some_and(|h| !h.is_cancelled() && !h.is_finished())
    }

    fn keys(&self) -> Vec<K> {
        self.workers.iter().map(|e| *e.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Cancels every worker and waits up to `grace` for each to exit.
    pub async fn shutdown_all(&self, grace: Duration) {
        let keys = self.keys();
        let mut tasks = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, handle)) = self.workers.remove(&key) {
                handle.cancel();
                tasks.push((key, handle.task));
            }
        }
        for (key, task) in tasks {
            match tokio::time::timeout(grace, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(?key, error = %e, "worker task panicked"),
                Err(_) => warn!(?key, "worker did not stop within grace period"),
            }
        }
    }
}
