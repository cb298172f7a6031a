//! Cache Module
//!
//! Event-driven LRU cache: a concurrent index for lookups plus a recency list
//! maintained by one background worker fed through a mutation queue.

mod entry;
pub(crate) mod evictor;
mod lru;
pub(crate) mod ops;
pub(crate) mod stats;
mod store;

#[cfg(any(test, feature = "diagnostics"))]
mod diagnostics;


// Re-export public types
pub use entry::CacheEntry;
pub(crate) use lru::RecencyList;
pub use stats::CacheStats;
pub use store::EventLruCache;

#[cfg(any(test, feature = "diagnostics"))]
pub use diagnostics::CacheDiagnostics;
