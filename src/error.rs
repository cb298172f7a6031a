//! Error types for the provider cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Argument rejected before any state was touched
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The cache has been shut down
    #[error("Cache has been shut down")]
    Disposed,

    /// The cache was constructed outside a tokio runtime
    #[error("No tokio runtime available to host the eviction worker")]
    NoRuntime,

    /// Configuration value could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
