//! Evictor Module
//!
//! Applies queued operations to the recency list. Only the eviction worker
//! owns an `Evictor`, so the list needs no locking.

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::cache::ops::CacheOp;
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, RecencyList};

/// Concurrent key index shared with the facade.
pub(crate) type Index<K, V, S> = DashMap<K, Arc<CacheEntry<K, V>>, S>;

// == Evictor ==
pub(crate) struct Evictor<K, V, S> {
    index: Arc<Index<K, V, S>>,
    list: RecencyList<K, V, S>,
    stats: Arc<StatsRecorder>,
    capacity: usize,
    compaction_fraction: f64,
}

impl<K, V, S> Evictor<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    pub fn new(
        index: Arc<Index<K, V, S>>,
        list: RecencyList<K, V, S>,
        stats: Arc<StatsRecorder>,
        capacity: usize,
        compaction_fraction: f64,
    ) -> Self {
        Self {
            index,
            list,
            stats,
            capacity,
            compaction_fraction,
        }
    }

    // == Apply ==
    /// Applies one operation to the list (and, for evictions, the index).
    pub fn apply(&mut self, op: CacheOp<K, V>) {
        match op {
            CacheOp::Promote(entry) => self.promote(entry),
            CacheOp::Unlink(entry) => {
                self.list.unlink(&entry);
            }
            CacheOp::Compact { reply } => {
                let evicted = self.compact();
                if let Some(reply) = reply {
                    let _ = reply.send(evicted);
                }
            }
            CacheOp::SweepExpired { now, reply } => {
                let removed = self.sweep_expired(now.unwrap_or_else(Utc::now));
                if let Some(reply) = reply {
                    let _ = reply.send(removed);
                }
            }
            #[cfg(any(test, feature = "diagnostics"))]
            CacheOp::Snapshot(reply) => {
                let _ = reply.send(self.list.keys());
            }
            #[cfg(any(test, feature = "diagnostics"))]
            CacheOp::Barrier(reply) => {
                let _ = reply.send(());
            }
        }
    }

    /// Links `entry` at the head only while the index still maps its key to
    /// this exact entry; a promotion that lost a race with a removal unlinks.
    fn promote(&mut self, entry: Arc<CacheEntry<K, V>>) {
        if self.is_live(&entry) {
            self.list.promote(entry);
        } else {
            self.list.unlink(&entry);
        }
    }

    fn is_live(&self, entry: &Arc<CacheEntry<K, V>>) -> bool {
        self.index
            .get(entry.key())
            .is_some_and(|current| Arc::ptr_eq(current.value(), entry))
    }

    /// Removes the key from the index only if it still holds `entry`.
    fn forget(&self, entry: &Arc<CacheEntry<K, V>>) -> bool {
        self.index
            .remove_if(entry.key(), |_, current| Arc::ptr_eq(current, entry))
            .is_some()
    }

    // == Compact ==
    /// Evicts least recently used entries until the index shrinks by the
    /// compaction fraction. Returns the number of index entries evicted.
    ///
    /// Stops early if the list runs dry; the next pass picks up the rest.
    pub fn compact(&mut self) -> usize {
        // Overflowing caches compact relative to capacity
        let current = self.index.len().min(self.capacity);
        let target = current - (current as f64 * self.compaction_fraction) as usize;

        let mut evicted = 0;
        while self.index.len() > target {
            let Some(entry) = self.list.pop_tail() else {
                break;
            };
            if self.forget(&entry) {
                evicted += 1;
                trace!("Evicted least recently used entry");
            }
        }

        self.stats.record_evictions(evicted as u64);
        debug!(
            "Compaction evicted {} entries (target {}, now {})",
            evicted,
            target,
            self.index.len()
        );
        evicted
    }

    // == Sweep Expired ==
    /// Walks the list once, dropping entries that expired before `now` from
    /// both the list and the index. Returns the number of index entries
    /// removed; nodes for keys already removed by the caller are not counted.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.list.drain_where(|entry| entry.is_expired_at(now));
        let removed = expired.iter().filter(|entry| self.forget(entry)).count();

        self.stats.record_expirations(removed as u64);
        debug!("Expiration sweep removed {} entries", removed);
        removed
    }

    #[cfg(test)]
    pub fn list(&self) -> &RecencyList<K, V, S> {
        &self.list
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::hash_map::RandomState;

    type TestEvictor = Evictor<String, u32, RandomState>;

    fn evictor(capacity: usize) -> TestEvictor {
        let hasher = RandomState::new();
        Evictor::new(
            Arc::new(DashMap::with_hasher(hasher.clone())),
            RecencyList::with_hasher(hasher),
            Arc::new(StatsRecorder::default()),
            capacity,
            0.20,
        )
    }

    /// Mirrors the facade: index first, then the queued promotion.
    fn insert(ev: &mut TestEvictor, key: &str, expires: Option<DateTime<Utc>>) -> Arc<CacheEntry<String, u32>> {
        let entry = Arc::new(CacheEntry::new(key.to_string(), 0, expires));
        ev.index.insert(key.to_string(), Arc::clone(&entry));
        ev.apply(CacheOp::Promote(Arc::clone(&entry)));
        entry
    }

    #[test]
    fn test_compaction_evicts_oldest_first() {
        let mut ev = evictor(10);
        for i in 0..10 {
            insert(&mut ev, &format!("k{}", i), None);
        }

        // 10 - floor(10 * 0.2) = 8
        assert_eq!(ev.compact(), 2);
        assert_eq!(ev.index.len(), 8);
        assert!(!ev.index.contains_key("k0"));
        assert!(!ev.index.contains_key("k1"));
        assert!(ev.index.contains_key("k2"));
        assert_eq!(ev.list().len(), 8);
    }

    #[test]
    fn test_compaction_respects_recency() {
        let mut ev = evictor(5);
        let a = insert(&mut ev, "a", None);
        insert(&mut ev, "b", None);
        insert(&mut ev, "c", None);
        ev.apply(CacheOp::Promote(a));

        assert_eq!(ev.list().keys(), vec!["a", "c", "b"]);

        // 3 - floor(0.6) = 3: nothing to do
        assert_eq!(ev.compact(), 0);

        ev.compaction_fraction = 0.5;
        // 3 - floor(1.5) = 2: b goes first
        assert_eq!(ev.compact(), 1);
        assert!(!ev.index.contains_key("b"));
        assert_eq!(ev.list().keys(), vec!["a", "c"]);
    }

    #[test]
    fn test_compaction_uses_capacity_when_overflowing() {
        let mut ev = evictor(10);
        for i in 0..15 {
            insert(&mut ev, &format!("k{}", i), None);
        }

        // min(15, 10) = 10, target 8
        assert_eq!(ev.compact(), 7);
        assert_eq!(ev.index.len(), 8);
    }

    #[test]
    fn test_compaction_tolerates_short_list() {
        let mut ev = evictor(10);
        for i in 0..5 {
            insert(&mut ev, &format!("linked{}", i), None);
        }
        // Index entries whose promotions have not been applied yet
        for i in 0..5 {
            let key = format!("pending{}", i);
            ev.index
                .insert(key.clone(), Arc::new(CacheEntry::new(key, 0, None)));
        }

        ev.compaction_fraction = 1.0;
        assert_eq!(ev.compact(), 5);
        assert_eq!(ev.index.len(), 5);
        assert!(ev.list().is_empty());
    }

    #[test]
    fn test_promote_after_remove_is_noop() {
        let mut ev = evictor(10);
        let entry = Arc::new(CacheEntry::new("gone".to_string(), 0, None));
        // Index never held it (removed before the promotion ran)
        ev.apply(CacheOp::Promote(entry));

        assert!(ev.list().is_empty());
    }

    #[test]
    fn test_stale_promote_does_not_disturb_replacement() {
        let mut ev = evictor(10);
        let first = insert(&mut ev, "k", None);
        ev.index.remove("k");
        let second = insert(&mut ev, "k", None);

        ev.apply(CacheOp::Promote(first.clone()));
        ev.apply(CacheOp::Unlink(first));

        assert_eq!(ev.list().keys(), vec!["k"]);
        assert!(ev.is_live(&second));
    }

    #[test]
    fn test_sweep_removes_expired_from_both() {
        let mut ev = evictor(10);
        let now = Utc::now();
        insert(&mut ev, "short", Some(now + Duration::hours(1)));
        insert(&mut ev, "forever", None);

        assert_eq!(ev.sweep_expired(now), 0);
        assert_eq!(ev.sweep_expired(now + Duration::hours(2)), 1);

        assert!(!ev.index.contains_key("short"));
        assert_eq!(ev.list().keys(), vec!["forever"]);
        assert_eq!(ev.stats.snapshot(0).expirations, 1);
    }

    #[test]
    fn test_sweep_skips_entries_already_removed() {
        let mut ev = evictor(10);
        let now = Utc::now();
        insert(&mut ev, "removed", Some(now + Duration::minutes(1)));
        insert(&mut ev, "expired", Some(now + Duration::minutes(1)));

        // Removed from the index, its unlink still queued
        ev.index.remove("removed");

        assert_eq!(ev.sweep_expired(now + Duration::minutes(2)), 1);
        assert!(ev.list().is_empty());
        assert_eq!(ev.stats.snapshot(0).expirations, 1);
    }

    #[test]
    fn test_replies_are_sent() {
        let mut ev = evictor(10);
        insert(&mut ev, "k", Some(Utc::now() + Duration::minutes(1)));

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        ev.apply(CacheOp::SweepExpired {
            now: Some(Utc::now() + Duration::minutes(2)),
            reply: Some(tx),
        });
        assert_eq!(rx.try_recv().unwrap(), 1);

        let (tx, mut rx) = tokio::sync::oneshot::channel();
        ev.apply(CacheOp::Snapshot(tx));
        assert!(rx.try_recv().unwrap().is_empty());
    }
}
