//! Recency List Module
//!
//! Doubly linked recency ordering over shared cache entries.

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crate::cache::CacheEntry;

/// Null link marker.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, V> {
    /// None while the slot sits on the free list
    entry: Option<Arc<CacheEntry<K, V>>>,
    prev: usize,
    next: usize,
}

// == Recency List ==
/// Tracks access order for LRU eviction.
///
/// - Head = most recently used
/// - Tail = least recently used
///
/// Nodes live in a `Vec` arena linked by index, with a key lookup table for
/// O(1) unlink. The list is not thread-safe; it is owned by the eviction
/// worker and mutated from that task only.
#[derive(Debug)]
pub struct RecencyList<K, V, S> {
    lookup: HashMap<K, usize, S>,
    arena: Vec<Node<K, V>>,
    head: usize,
    tail: usize,
    free_head: usize,
}

impl<K, V, S> RecencyList<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher,
{
    // == Constructor ==
    /// Creates a new empty list keyed with the given hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            lookup: HashMap::with_hasher(hasher),
            arena: Vec::new(),
            head: NIL,
            tail: NIL,
            free_head: NIL,
        }
    }

    // == Promote ==
    /// Moves `entry` to the head.
    ///
    /// Any existing link for the same key is removed first, so applying the
    /// same promotion twice leaves exactly one node.
    pub fn promote(&mut self, entry: Arc<CacheEntry<K, V>>) {
        if let Some(idx) = self.lookup.remove(entry.key()) {
            self.release(idx);
        }
        let key = entry.key().clone();
        let idx = self.alloc(entry);
        self.push_head(idx);
        self.lookup.insert(key, idx);
    }

    // == Unlink ==
    /// Removes the node for `entry`'s key if it still holds this exact entry.
    ///
    /// Returns whether a node was removed.
    pub fn unlink(&mut self, entry: &Arc<CacheEntry<K, V>>) -> bool {
        let Some(&idx) = self.lookup.get(entry.key()) else {
            return false;
        };
        let same = self.arena[idx]
            .entry
            .as_ref()
            .is_some_and(|linked| Arc::ptr_eq(linked, entry));
        if !same {
            return false;
        }
        self.lookup.remove(entry.key());
        self.release(idx);
        true
    }

    // == Pop Tail ==
    /// Removes and returns the least recently used entry.
    pub fn pop_tail(&mut self) -> Option<Arc<CacheEntry<K, V>>> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        let entry = self.release(idx)?;
        self.lookup.remove(entry.key());
        Some(entry)
    }

    // == Drain Matching ==
    /// Walks head to tail once, unlinking every entry matching `pred`.
    pub fn drain_where<F>(&mut self, mut pred: F) -> Vec<Arc<CacheEntry<K, V>>>
    where
        F: FnMut(&CacheEntry<K, V>) -> bool,
    {
        let mut removed = Vec::new();
        let mut idx = self.head;
        while idx != NIL {
            let next = self.arena[idx].next;
            let matched = self.arena[idx]
                .entry
                .as_ref()
                .is_some_and(|entry| pred(entry));
            if matched {
                if let Some(entry) = self.release(idx) {
                    self.lookup.remove(entry.key());
                    removed.push(entry);
                }
            }
            idx = next;
        }
        removed
    }

    /// Keys from head (most recent) to tail.
    #[cfg(any(test, feature = "diagnostics"))]
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.lookup.len());
        let mut idx = self.head;
        while idx != NIL {
            if let Some(entry) = &self.arena[idx].entry {
                keys.push(entry.key().clone());
            }
            idx = self.arena[idx].next;
        }
        keys
    }

    /// Key of the least recently used entry.
    #[cfg(test)]
    pub fn peek_tail(&self) -> Option<&K> {
        if self.tail == NIL {
            return None;
        }
        self.arena[self.tail].entry.as_ref().map(|entry| entry.key())
    }

    // == Length ==
    /// Number of linked entries.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    // == Is Empty ==
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    // == Contains ==
    /// Checks if a key is linked.
    #[cfg(test)]
    pub fn contains(&self, key: &K) -> bool {
        self.lookup.contains_key(key)
    }

    fn alloc(&mut self, entry: Arc<CacheEntry<K, V>>) -> usize {
        let node = Node {
            entry: Some(entry),
            prev: NIL,
            next: NIL,
        };
        if self.free_head == NIL {
            self.arena.push(node);
            self.arena.len() - 1
        } else {
            let idx = self.free_head;
            self.free_head = self.arena[idx].next;
            self.arena[idx] = node;
            idx
        }
    }

    /// Unlinks slot `idx`, returns it to the free list and hands back its entry.
    /// The lookup table is left to the caller.
    fn release(&mut self, idx: usize) -> Option<Arc<CacheEntry<K, V>>> {
        let (prev, next) = (self.arena[idx].prev, self.arena[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.arena[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.arena[next].prev = prev;
        }

        let node = &mut self.arena[idx];
        let entry = node.entry.take();
        node.prev = NIL;
        node.next = self.free_head;
        self.free_head = idx;
        entry
    }

    fn push_head(&mut self, idx: usize) {
        self.arena[idx].prev = NIL;
        self.arena[idx].next = self.head;
        if self.head != NIL {
            self.arena[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}
