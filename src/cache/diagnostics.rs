//! Diagnostics Module
//!
//! Introspection for tests. Compiled only for unit tests or with the
//! `diagnostics` feature; production code never sees the recency list.

use std::hash::{BuildHasher, Hash};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::cache::ops::CacheOp;
use crate::cache::EventLruCache;
use crate::error::{CacheError, Result};

// == Cache Diagnostics ==
/// Read-only views of the deferred structures, routed through the worker so
/// they observe the list exactly as the worker does.
#[allow(async_fn_in_trait)]
pub trait CacheDiagnostics<K> {
    /// Recency list keys, most recent first.
    async fn recency_keys(&self) -> Result<Vec<K>>;

    /// Recency list length.
    async fn recency_len(&self) -> Result<usize> {
        Ok(self.recency_keys().await?.len())
    }

    /// Index length.
    fn map_len(&self) -> usize;

    /// Operations queued but not yet applied.
    fn pending_ops(&self) -> usize;

    /// Resolves once every operation queued before this call has been applied.
    async fn wait_for_processing(&self) -> Result<()>;

    /// Runs an expiration sweep on the worker with an explicit clock.
    async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Runs a compaction pass on the worker, returning the eviction count.
    async fn compact_now(&self) -> Result<usize>;
}

impl<K, V, S> CacheDiagnostics<K> for EventLruCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    async fn recency_keys(&self) -> Result<Vec<K>> {
        self.request(CacheOp::Snapshot).await
    }

    fn map_len(&self) -> usize {
        self.index.len()
    }

    fn pending_ops(&self) -> usize {
        self.queue.pending()
    }

    async fn wait_for_processing(&self) -> Result<()> {
        self.request(CacheOp::Barrier).await
    }

    async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        self.request(|reply| CacheOp::SweepExpired {
            now: Some(now),
            reply: Some(reply),
        })
        .await
    }

    async fn compact_now(&self) -> Result<usize> {
        self.request(|reply| CacheOp::Compact { reply: Some(reply) })
            .await
    }
}

impl<K, V, S> EventLruCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    /// Enqueues an op carrying a reply channel and waits for the worker's answer.
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> CacheOp<K, V>) -> Result<T> {
        self.ensure_live()?;
        let (tx, rx) = oneshot::channel();
        if !self.queue.push(build(tx)) {
            return Err(CacheError::Disposed);
        }
        rx.await.map_err(|_| CacheError::Disposed)
    }
}
