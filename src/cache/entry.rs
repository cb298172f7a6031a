//! Cache Entry Module
//!
//! Defines the record shared between the concurrent index and the recency list.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

// == Cache Entry ==
/// A single cached key with its mutable value and expiration.
///
/// The key never changes. Value and expiration are updated in place when the
/// same key is set again, so the index and the recency list keep pointing at
/// one shared allocation for the lifetime of the entry.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    state: RwLock<EntryState<V>>,
}

#[derive(Debug)]
struct EntryState<V> {
    value: V,
    /// None = never expires
    expires_at: Option<DateTime<Utc>>,
}

impl<K, V: Clone> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new entry with an optional absolute expiration.
    pub fn new(key: K, value: V, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            key,
            state: RwLock::new(EntryState { value, expires_at }),
        }
    }

    /// The immutable key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// A clone of the current value.
    pub fn value(&self) -> V {
        self.state.read().value.clone()
    }

    /// Current expiration, `None` meaning never.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().expires_at
    }

    // == Update ==
    /// Replaces value and expiration in place.
    pub fn update(&self, value: V, expires_at: Option<DateTime<Utc>>) {
        let mut state = self.state.write();
        state.value = value;
        state.expires_at = expires_at;
    }

    // == Is Expired ==
    /// Checks whether the entry expired strictly before `now`.
    ///
    /// An entry whose expiration equals `now` is still live.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires) => expires < now,
            None => false,
        }
    }
}
