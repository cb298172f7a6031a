//! Provider Cache
//!
//! Typed front for `EventLruCache` keyed by `ProviderFingerprint`.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheStats, EventLruCache};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::provider::ProviderFingerprint;

// == Provider Cache ==
/// Memoizes expensive providers so repeated validations reuse one instance.
pub struct ProviderCache<P> {
    cache: EventLruCache<ProviderFingerprint, Arc<P>>,
}

impl<P> ProviderCache<P>
where
    P: Send + Sync + 'static,
{
    /// Creates a provider cache with the default size limit.
    pub fn new() -> Result<Self> {
        Self::with_config(&CacheConfig::default())
    }

    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: EventLruCache::with_config(config)?,
        })
    }

    // == Get Or Create ==
    /// Returns the cached provider for `fingerprint`, building and caching one
    /// with `create` on a miss. A failed build caches nothing.
    ///
    /// Two callers racing on the same miss may both build; the later store wins.
    pub fn get_or_create<F, E>(&self, fingerprint: &ProviderFingerprint, create: F) -> std::result::Result<Arc<P>, E>
    where
        F: FnOnce(&ProviderFingerprint) -> std::result::Result<P, E>,
        E: From<CacheError>,
    {
        if let Some(provider) = self.cache.get(fingerprint)? {
            return Ok(provider);
        }

        debug!("Creating provider for {}", fingerprint);
        let provider = Arc::new(create(fingerprint)?);
        self.cache.set(fingerprint.clone(), Arc::clone(&provider))?;
        Ok(provider)
    }

    pub fn try_get(&self, fingerprint: &ProviderFingerprint) -> Result<Option<Arc<P>>> {
        self.cache.get(fingerprint)
    }

    /// Adds `provider` unless one is already cached for `fingerprint`.
    pub fn try_add(&self, fingerprint: ProviderFingerprint, provider: Arc<P>) -> Result<bool> {
        if self.cache.contains(&fingerprint)? {
            return Ok(false);
        }
        self.cache.set(fingerprint, provider)
    }

    pub fn try_remove(&self, fingerprint: &ProviderFingerprint) -> Result<Option<Arc<P>>> {
        self.cache.remove(fingerprint)
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The underlying cache.
    pub fn inner(&self) -> &EventLruCache<ProviderFingerprint, Arc<P>> {
        &self.cache
    }

    pub async fn shutdown(&self) {
        self.cache.shutdown().await;
    }
}
