//! Cache configuration

use rangecache_origin::OriginConfig;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Default cache block size
pub const DEFAULT_BLOCK_SIZE: u64 = 8192;

/// Default interval between remote staleness checks
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default upper bound on a single origin request
pub const DEFAULT_MAX_FETCH_SIZE: u64 = 64 * 1024 * 1024;

/// Default cache root: `<user cache dir>/rangecache`, or the system temp
/// directory when the platform has no cache directory
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rangecache")
}

/// Settings for [`CachedFile`](crate::CachedFile) and the free functions
/// built on it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding all cache entries
    pub cache_dir: PathBuf,

    /// Block size for newly created entries
    ///
    /// Existing entries keep the block size recorded in their header.
    pub block_size: u64,

    /// Minimum time between staleness checks against the origin
    pub cache_timeout: Duration,

    /// Largest single origin request; rounded down to whole blocks
    pub max_fetch_size: u64,

    /// `fsync` block data before the bits covering it are persisted
    pub sync_data: bool,

    /// Origin transport settings
    pub origin: OriginConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            block_size: DEFAULT_BLOCK_SIZE,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            max_fetch_size: DEFAULT_MAX_FETCH_SIZE,
            sync_data: false,
            origin: OriginConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache root directory
    pub fn with_cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the block size for new entries
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the staleness check interval
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Set the largest single origin request
    pub fn with_max_fetch_size(mut self, bytes: u64) -> Self {
        self.max_fetch_size = bytes;
        self
    }

    /// Enable or disable syncing block data before persisting bits
    pub fn with_sync_data(mut self, sync: bool) -> Self {
        self.sync_data = sync;
        self
    }

    /// Set the origin transport settings
    pub fn with_origin(mut self, origin: OriginConfig) -> Self {
        self.origin = origin;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir must not be empty".to_string());
        }

        if self.block_size == 0 {
            return Err("block_size must be greater than 0".to_string());
        }

        if self.max_fetch_size < self.block_size {
            return Err(format!(
                "max_fetch_size ({}) must be at least block_size ({})",
                self.max_fetch_size, self.block_size
            ));
        }

        self.origin.validate()
    }

    /// Largest origin request in bytes, a whole number of blocks
    pub(crate) fn fetch_step(&self, block_size: u64) -> u64 {
        (self.max_fetch_size / block_size).max(1) * block_size
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_size, 8192);
        assert!(config.cache_dir.ends_with("rangecache"));
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::new()
            .with_cache_dir("/tmp/rc")
            .with_block_size(4096)
            .with_cache_timeout(Duration::ZERO)
            .with_max_fetch_size(4096 * 3)
            .with_sync_data(true);

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/rc"));
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.cache_timeout, Duration::ZERO);
        assert!(config.sync_data);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(CacheConfig::new().with_block_size(0).validate().is_err());
        assert!(CacheConfig::new().with_cache_dir("").validate().is_err());
        assert!(
            CacheConfig::new()
                .with_block_size(8192)
                .with_max_fetch_size(100)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_fetch_step_is_block_aligned() {
        let config = CacheConfig::new().with_max_fetch_size(10_000);
        assert_eq!(config.fetch_step(4096), 8192);
        assert_eq!(config.fetch_step(8192), 8192);
        assert_eq!(config.fetch_step(16_384), 16_384);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = CacheConfig::new().with_block_size(1024);
        let json = serde_json::to_string(&config).expect("serialize");
        let back: CacheConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
