//! Provider Module
//!
//! Cache keys and a typed wrapper for memoizing signing/verification
//! providers and resolved keys by credential fingerprint.

mod fingerprint;
mod provider_cache;

pub use fingerprint::ProviderFingerprint;
pub use provider_cache::ProviderCache;
