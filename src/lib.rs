//! Token Key Cache - event-driven LRU cache for cryptographic providers
//!
//! Memoizes signing/verification providers and resolved keys so token
//! validation does not rebuild them on every call. Lookups hit a concurrent
//! index; recency bookkeeping runs on a single background worker.

pub mod cache;
pub mod config;
pub mod error;
pub mod provider;
mod tasks;

pub use cache::{CacheStats, EventLruCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use provider::{ProviderCache, ProviderFingerprint};
