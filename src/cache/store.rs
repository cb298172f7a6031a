//! Cache Store Module
//!
//! The public facade: a concurrent index answers every query immediately,
//! while recency bookkeeping is deferred to the eviction worker through the
//! mutation queue.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::evictor::{Evictor, Index};
use crate::cache::ops::{self, CacheOp, MutationQueue};
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, RecencyList};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_cleanup_task, spawn_eviction_worker};

// == Event LRU Cache ==
/// Concurrent LRU cache whose recency list is maintained by a single
/// background worker.
///
/// `get`, `set`, `remove` and `contains` never wait for the worker. The index
/// is always authoritative for membership and values; the recency list
/// converges to the same membership once the queue drains.
///
/// Must be created inside a tokio runtime, which hosts the eviction worker
/// and the expiration sweeper. Share it across threads with `Arc`.
pub struct EventLruCache<K, V, S = RandomState> {
    pub(super) index: Arc<Index<K, V, S>>,
    pub(super) queue: MutationQueue<K, V>,
    stats: Arc<StatsRecorder>,
    capacity: usize,
    high_water_mark: f64,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<K, V> EventLruCache<K, V, RandomState>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding roughly `capacity` entries, with default tuning.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(&CacheConfig::with_capacity(capacity))
    }

    /// Creates a cache from a full configuration.
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        Self::with_hasher(config, RandomState::new())
    }
}

impl<K, V, S> EventLruCache<K, V, S>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
{
    /// Creates a cache whose index and recency list hash keys with `hasher`.
    ///
    /// Fails with `InvalidArgument` for a bad config and `NoRuntime` when
    /// called outside a tokio runtime.
    pub fn with_hasher(config: &CacheConfig, hasher: S) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let index = Arc::new(DashMap::with_hasher(hasher.clone()));
        let stats = Arc::new(StatsRecorder::default());
        let (queue, receiver) = ops::channel();
        let shutdown = CancellationToken::new();

        let evictor = Evictor::new(
            Arc::clone(&index),
            RecencyList::with_hasher(hasher),
            Arc::clone(&stats),
            config.capacity,
            config.compaction_fraction,
        );
        let worker = spawn_eviction_worker(&runtime, evictor, receiver, shutdown.clone());
        let sweeper = spawn_cleanup_task(
            &runtime,
            queue.clone(),
            config.sweep_interval(),
            shutdown.clone(),
        );

        info!(
            "Cache started: capacity={}, high_water_mark={}, compaction_fraction={}, sweep_interval={}s",
            config.capacity,
            config.high_water_mark,
            config.compaction_fraction,
            config.sweep_interval_secs
        );

        Ok(Self {
            index,
            queue,
            stats,
            capacity: config.capacity,
            high_water_mark: config.high_water_mark,
            shutdown,
            tasks: Mutex::new(vec![worker, sweeper]),
        })
    }

    // == Contains ==
    /// Checks index membership. No recency side effects.
    pub fn contains(&self, key: &K) -> Result<bool> {
        self.ensure_live()?;
        Ok(self.index.contains_key(key))
    }

    // == Set ==
    /// Stores a value that never expires. Always returns `Ok(true)` while live.
    pub fn set(&self, key: K, value: V) -> Result<bool> {
        self.store(key, value, None)
    }

    /// Stores a value that expires at `expiration`.
    ///
    /// Returns `Ok(false)` without touching the cache if `expiration` is
    /// already in the past.
    pub fn set_with_expiration(&self, key: K, value: V, expiration: DateTime<Utc>) -> Result<bool> {
        self.ensure_live()?;
        if expiration < Utc::now() {
            return Ok(false);
        }
        self.store(key, value, Some(expiration))
    }

    /// Stores a value that expires `ttl` from now. A `ttl` too large to
    /// represent never expires.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<bool> {
        let expiration = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta));
        self.store(key, value, expiration)
    }

    fn store(&self, key: K, value: V, expiration: Option<DateTime<Utc>>) -> Result<bool> {
        self.ensure_live()?;

        // Existing key: update in place under the shard guard so a racing
        // remove either sees the new value or happens before the lookup
        if let Some(current) = self.index.get(&key) {
            current.value().update(value, expiration);
            let entry = Arc::clone(current.value());
            drop(current);
            self.stats.record_update();
            self.queue.push(CacheOp::Promote(entry));
            return Ok(true);
        }

        if self.index.len() as f64 / self.capacity as f64 >= self.high_water_mark {
            self.queue.push(CacheOp::Compact { reply: None });
        }

        // Another caller may have inserted the key since the lookup above
        let entry = match self.index.entry(key) {
            Entry::Occupied(occupied) => {
                occupied.get().update(value, expiration);
                let entry = Arc::clone(occupied.get());
                drop(occupied);
                self.stats.record_update();
                entry
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(CacheEntry::new(vacant.key().clone(), value, expiration));
                vacant.insert(Arc::clone(&entry));
                self.stats.record_insert();
                entry
            }
        };
        self.queue.push(CacheOp::Promote(entry));

        Ok(true)
    }

    // == Get ==
    /// Returns the current value and marks the key as freshly used.
    ///
    /// Expired entries are returned until a sweep or overwrite removes them.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        self.ensure_live()?;

        let Some(entry) = self.index.get(key).map(|current| Arc::clone(current.value())) else {
            self.stats.record_miss();
            return Ok(None);
        };

        self.stats.record_hit();
        let value = entry.value();
        self.queue.push(CacheOp::Promote(entry));
        Ok(Some(value))
    }

    // == Remove ==
    /// Removes a key, returning its value if it was present.
    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.ensure_live()?;

        let Some((_, entry)) = self.index.remove(key) else {
            return Ok(None);
        };

        self.stats.record_removal();
        let value = entry.value();
        self.queue.push(CacheOp::Unlink(entry));
        Ok(Some(value))
    }

    // == Length ==
    /// Returns the current number of entries in the index.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl<K, V, S> EventLruCache<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.index.len())
    }

    /// Whether `shutdown` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // == Shutdown ==
    /// Stops the eviction worker and the sweeper and waits for both.
    ///
    /// Queued operations are discarded. Every later call on the cache fails
    /// with `CacheError::Disposed`. Calling this again is a no-op.
    pub async fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Cache shutting down with {} entries", self.index.len());
        }
        self.shutdown.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            // The tasks never panic on their own; a JoinError means the runtime is going away.
            let _ = task.await;
        }
    }

    pub(super) fn ensure_live(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(CacheError::Disposed);
        }
        Ok(())
    }
}

impl<K, V, S> Drop for EventLruCache<K, V, S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<K, V, S> std::fmt::Debug for EventLruCache<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.index.len())
            .field("pending_ops", &self.queue.pending())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}
