//! Per-resource write serialization
//!
//! [`WriteGate`] keeps one queue per key (the file adapter uses the table
//! name). Each queue is owned by a worker task that drives its operations
//! one at a time, in submission order. Operations on different keys run
//! concurrently.
//!
//! A failing operation only fails its own caller: the worker moves on to the
//! next queued operation, and a panicking operation is caught and reported as
//! [`StoreError::Internal`].
//!
//! Serialization is in-process only; two processes sharing a storage root
//! are not coordinated.

use crate::core::error::{StoreError, StoreResult};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Serializes asynchronous operations per key
///
/// Cloning is cheap and clones share the same queues. Must be used from
/// within a Tokio runtime.
#[derive(Clone, Default)]
pub struct WriteGate {
    queues: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Job>>>>,
}

impl WriteGate {
    /// Create a gate with no queues; queues are created on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` after every operation previously scheduled on `key`
    /// has settled, and resolve with its own outcome
    pub async fn run<F, T>(&self, key: &str, operation: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // The caller may have stopped waiting; the write still happened.
            let _ = tx.send(operation.await);
        });

        self.enqueue(key, job);

        rx.await.map_err(|_| {
            StoreError::Internal(format!(
                "write operation on '{}' did not complete (panicked)",
                key
            ))
        })?
    }

    /// Number of keys that currently own a queue
    pub fn queue_count(&self) -> usize {
        self.lock_queues().len()
    }

    fn enqueue(&self, key: &str, job: Job) {
        let mut queues = self.lock_queues();

        let job = match queues.get(key) {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                // Worker is gone (runtime shut down); start a fresh one.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let sender = spawn_worker(key.to_string());
        if sender.send(job).is_err() {
            tracing::warn!(key = %key, "write queue closed before the first operation");
        }
        queues.insert(key.to_string(), sender);
    }

    fn lock_queues(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Job>>> {
        // The map is only touched for inserts and sends, so it stays
        // consistent even if a holder panicked.
        self.queues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn spawn_worker(key: String) -> mpsc::UnboundedSender<Job> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    tokio::spawn(async move {
        tracing::trace!(key = %key, "write queue started");
        while let Some(job) = rx.recv().await {
            if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                tracing::warn!(key = %key, "write operation panicked, continuing with the queue");
            }
        }
        tracing::trace!(key = %key, "write queue closed");
    });

    tx
}
