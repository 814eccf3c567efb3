//! # Library Configuration
//!
//! Tunables for the reconciler and the library poller.

use crate::covers::DEFAULT_COVER_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Library reconciliation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// How often the poller starts a reconciliation pass.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// How long remote scan results are reused before the servers are
    /// scanned again. A change of the enabled server set bypasses this.
    ///
    /// Default: 60 seconds.
    #[serde(default = "default_remote_ttl")]
    pub remote_ttl: Duration,

    /// Number of cover locators kept in memory.
    #[serde(default = "default_cover_cache_capacity")]
    pub cover_cache_capacity: usize,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            remote_ttl: default_remote_ttl(),
            cover_cache_capacity: default_cover_cache_capacity(),
        }
    }
}

impl LibraryConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be > 0".to_string());
        }
        if self.cover_cache_capacity == 0 {
            return Err("cover_cache_capacity must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_remote_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_cover_cache_capacity() -> usize {
    DEFAULT_COVER_CACHE_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LibraryConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.remote_ttl, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_poll_rejected() {
        let config = LibraryConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
