//! Mutation Queue Module
//!
//! Deferred recency-list operations and the unbounded channel that carries
//! them from caller threads to the eviction worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::cache::CacheEntry;

// == Cache Op ==
/// One deferred operation, applied by the eviction worker in FIFO order.
pub(crate) enum CacheOp<K, V> {
    /// Unlink any node for the entry's key, then link the entry at the head.
    Promote(Arc<CacheEntry<K, V>>),
    /// Unlink the node holding this entry.
    Unlink(Arc<CacheEntry<K, V>>),
    /// Evict from the tail until the index is back under the compaction target.
    Compact { reply: Option<oneshot::Sender<usize>> },
    /// Remove every entry that expired before `now` (wall clock when `None`).
    SweepExpired {
        now: Option<DateTime<Utc>>,
        reply: Option<oneshot::Sender<usize>>,
    },
    /// Report recency keys head to tail.
    #[cfg(any(test, feature = "diagnostics"))]
    Snapshot(oneshot::Sender<Vec<K>>),
    /// Resolve once every earlier operation has been applied.
    #[cfg(any(test, feature = "diagnostics"))]
    Barrier(oneshot::Sender<()>),
}

impl<K, V> CacheOp<K, V> {
    pub fn name(&self) -> &'static str {
        match self {
            CacheOp::Promote(_) => "promote",
            CacheOp::Unlink(_) => "unlink",
            CacheOp::Compact { .. } => "compact",
            CacheOp::SweepExpired { .. } => "sweep",
            #[cfg(any(test, feature = "diagnostics"))]
            CacheOp::Snapshot(_) => "snapshot",
            #[cfg(any(test, feature = "diagnostics"))]
            CacheOp::Barrier(_) => "barrier",
        }
    }
}

// == Mutation Queue ==
/// Producer side of the queue. Cloned into every task that schedules work.
pub(crate) struct MutationQueue<K, V> {
    tx: mpsc::UnboundedSender<CacheOp<K, V>>,
    pending: Arc<AtomicUsize>,
}

impl<K, V> Clone for MutationQueue<K, V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K, V> MutationQueue<K, V> {
    // == Push ==
    /// Enqueues without blocking. Returns false if the worker has stopped.
    pub fn push(&self, op: CacheOp<K, V>) -> bool {
        self.pending.fetch_add(1, Ordering::AcqRel);
        match self.tx.send(op) {
            Ok(()) => true,
            Err(mpsc::error::SendError(op)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                warn!("Dropping {} operation: eviction worker has stopped", op.name());
                false
            }
        }
    }

    /// Operations queued but not yet applied.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

// == Queue Receiver ==
/// Consumer side of the queue, owned by the eviction worker.
pub(crate) struct QueueReceiver<K, V> {
    rx: mpsc::UnboundedReceiver<CacheOp<K, V>>,
    pending: Arc<AtomicUsize>,
}

impl<K, V> QueueReceiver<K, V> {
    /// Waits for the next operation; `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<CacheOp<K, V>> {
        self.rx.recv().await
    }

    /// Marks one received operation as applied.
    pub fn complete(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }

    /// Closes the channel and drops whatever is still queued.
    pub fn abandon(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            self.complete();
            dropped += 1;
        }
        dropped
    }
}

/// Creates a connected queue pair.
pub(crate) fn channel<K, V>() -> (MutationQueue<K, V>, QueueReceiver<K, V>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        MutationQueue {
            tx,
            pending: Arc::clone(&pending),
        },
        QueueReceiver { rx, pending },
    )
}
