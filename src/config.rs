//! Configuration Module
//!
//! Cache sizing and sweep parameters, loadable from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Default number of entries, matching the provider cache size limit.
pub const DEFAULT_CAPACITY: usize = 1000;
/// Fraction of capacity at which a compaction is queued.
pub const DEFAULT_HIGH_WATER_MARK: f64 = 0.95;
/// Fraction of the cache removed by one compaction pass.
pub const DEFAULT_COMPACTION_FRACTION: f64 = 0.20;
/// Interval between expiration sweeps (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries the cache should hold
    pub capacity: usize,
    /// Fraction of `capacity` that triggers a compaction on insert
    pub high_water_mark: f64,
    /// Fraction of the current size evicted by a compaction
    pub compaction_fraction: f64,
    /// Seconds between expiration sweeps
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    /// Creates a config with the given capacity and default tuning.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum entries (default: 1000)
    /// - `CACHE_HIGH_WATER_MARK` - Compaction trigger fraction (default: 0.95)
    /// - `CACHE_COMPACTION_FRACTION` - Fraction evicted per compaction (default: 0.20)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Expiration sweep interval (default: 300)
    ///
    /// Unset variables fall back to defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            capacity: env_or("CACHE_CAPACITY", DEFAULT_CAPACITY)?,
            high_water_mark: env_or("CACHE_HIGH_WATER_MARK", DEFAULT_HIGH_WATER_MARK)?,
            compaction_fraction: env_or("CACHE_COMPACTION_FRACTION", DEFAULT_COMPACTION_FRACTION)?,
            sweep_interval_secs: env_or("CACHE_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every parameter, rejecting the first invalid one.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidArgument(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if !(self.high_water_mark > 0.0 && self.high_water_mark <= 1.0) {
            return Err(CacheError::InvalidArgument(format!(
                "high_water_mark must be in (0, 1], got {}",
                self.high_water_mark
            )));
        }
        if !(self.compaction_fraction > 0.0 && self.compaction_fraction <= 1.0) {
            return Err(CacheError::InvalidArgument(format!(
                "compaction_fraction must be in (0, 1], got {}",
                self.compaction_fraction
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(CacheError::InvalidArgument(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            compaction_fraction: DEFAULT_COMPACTION_FRACTION,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CacheError::Config(format!("{} has invalid value {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}
