//! Eviction Worker
//!
//! The single consumer of the mutation queue. Owns the recency list through
//! its `Evictor` and applies queued operations one at a time.

use std::hash::{BuildHasher, Hash};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::evictor::Evictor;
use crate::cache::ops::QueueReceiver;

/// Spawns the eviction worker on `runtime`.
///
/// The loop ends when `shutdown` is cancelled or every queue producer has
/// been dropped. Operations still queued at that point are discarded; they
/// only carry recency bookkeeping, never index state.
pub(crate) fn spawn_eviction_worker<K, V, S>(
    runtime: &Handle,
    mut evictor: Evictor<K, V, S>,
    mut receiver: QueueReceiver<K, V>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    runtime.spawn(async move {
        debug!("Eviction worker started");

        loop {
            let op = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                op = receiver.recv() => match op {
                    Some(op) => op,
                    None => break,
                },
            };

            // Settle the counter before any reply goes out
            receiver.complete();
            evictor.apply(op);
        }

        let dropped = receiver.abandon();
        info!("Eviction worker stopped, {} queued operations discarded", dropped);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::RandomState;
    use std::sync::Arc;
    use std::time::Duration;

    use dashmap::DashMap;
    use tokio::sync::oneshot;

    use crate::cache::ops::{channel, CacheOp};
    use crate::cache::stats::StatsRecorder;
    use crate::cache::{CacheEntry, RecencyList};

    fn evictor(
        index: Arc<DashMap<&'static str, Arc<CacheEntry<&'static str, u32>>, RandomState>>,
    ) -> Evictor<&'static str, u32, RandomState> {
        Evictor::new(
            index,
            RecencyList::with_hasher(RandomState::new()),
            Arc::new(StatsRecorder::default()),
            10,
            0.2,
        )
    }

    #[tokio::test]
    async fn test_worker_applies_ops_in_order() {
        let index = Arc::new(DashMap::with_hasher(RandomState::new()));
        let (queue, receiver) = channel();
        let token = CancellationToken::new();
        let handle = spawn_eviction_worker(
            &Handle::current(),
            evictor(Arc::clone(&index)),
            receiver,
            token.clone(),
        );

        for key in ["a", "b", "c"] {
            let entry = Arc::new(CacheEntry::new(key, 0, None));
            index.insert(key, Arc::clone(&entry));
            queue.push(CacheOp::Promote(entry));
        }

        let (tx, rx) = oneshot::channel();
        queue.push(CacheOp::Snapshot(tx));
        assert_eq!(rx.await.unwrap(), vec!["c", "b", "a"]);
        assert_eq!(queue.pending(), 0);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pending_is_zero_once_reply_arrives() {
        let index = Arc::new(DashMap::with_hasher(RandomState::new()));
        let (queue, receiver) = channel();
        let token = CancellationToken::new();
        let handle = spawn_eviction_worker(
            &Handle::current(),
            evictor(Arc::clone(&index)),
            receiver,
            token.clone(),
        );

        for round in 0..500u32 {
            let key = ["a", "b", "c", "d", "e"][(round % 5) as usize];
            let entry = Arc::new(CacheEntry::new(key, round, None));
            index.insert(key, Arc::clone(&entry));
            queue.push(CacheOp::Promote(entry));

            let (tx, rx) = oneshot::channel();
            queue.push(CacheOp::Barrier(tx));
            rx.await.unwrap();
            assert_eq!(queue.pending(), 0, "round {}", round);
        }

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_on_cancel() {
        let index = Arc::new(DashMap::with_hasher(RandomState::new()));
        let (queue, receiver) = channel::<&'static str, u32>();
        let token = CancellationToken::new();
        let handle = spawn_eviction_worker(&Handle::current(), evictor(index), receiver, token.clone());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap();

        assert!(!queue.push(CacheOp::Compact { reply: None }));
    }

    #[tokio::test]
    async fn test_worker_stops_when_producers_dropped() {
        let index = Arc::new(DashMap::with_hasher(RandomState::new()));
        let (queue, receiver) = channel::<&'static str, u32>();
        let handle = spawn_eviction_worker(
            &Handle::current(),
            evictor(index),
            receiver,
            CancellationToken::new(),
        );

        drop(queue);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop once the queue closes")
            .unwrap();
    }
}
