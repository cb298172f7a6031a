//! Provider Fingerprint
//!
//! Identifies one provider instance: the same key used with a different
//! algorithm, or for signing rather than verifying, is a different provider.

use std::fmt;

use serde::{Deserialize, Serialize};

// == Provider Fingerprint ==
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderFingerprint {
    /// Provider implementation, e.g. "AsymmetricSignatureProvider"
    pub provider_kind: String,
    /// Key identifier (kid or certificate thumbprint)
    pub key_id: String,
    /// Algorithm the provider was built for, e.g. "RS256"
    pub algorithm: String,
    /// true for signing providers, false for verification-only
    pub will_create_signatures: bool,
}

impl ProviderFingerprint {
    pub fn new(
        provider_kind: impl Into<String>,
        key_id: impl Into<String>,
        algorithm: impl Into<String>,
        will_create_signatures: bool,
    ) -> Self {
        Self {
            provider_kind: provider_kind.into(),
            key_id: key_id.into(),
            algorithm: algorithm.into(),
            will_create_signatures,
        }
    }
}

impl fmt::Display for ProviderFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.provider_kind, self.key_id, self.algorithm, self.will_create_signatures
        )
    }
}
