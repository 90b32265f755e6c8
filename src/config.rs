//! Coordinator configuration
//!
//! Loaded from YAML; every field is optional and falls back to its default.
//!
//! ```yaml
//! memory_capacity: 4MB
//! disk_capacity: 50MB
//! disk_max_age_secs: 86400
//! cache_dir: /var/cache/imagefetch
//! high_watermark: 0.9
//! low_watermark: 0.8
//! http_timeout_secs: 30
//! user_agent: imagefetch/0.1
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::{DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT};
use crate::cache::{
    ByteCount, DiskCacheConfig, MemoryCacheConfig, DEFAULT_DISK_CAPACITY, DEFAULT_DISK_MAX_AGE,
    DEFAULT_MEMORY_CAPACITY,
};
use crate::error::{Error, Result};
use crate::fetch::CacheConfig;

/// Everything needed to assemble a coordinator
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Memory tier budget
    pub memory_capacity: ByteCount,
    /// Disk tier budget
    pub disk_capacity: ByteCount,
    /// Disk freshness window in seconds
    pub disk_max_age_secs: u64,
    /// Directory for the disk tier; volatile storage when unset
    pub cache_dir: Option<PathBuf>,
    /// Memory usage fraction that triggers eviction
    pub high_watermark: f64,
    /// Memory usage fraction eviction stops at
    pub low_watermark: f64,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
    /// `User-Agent` header for HTTP requests
    pub user_agent: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let memory = MemoryCacheConfig::default();
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            disk_capacity: DEFAULT_DISK_CAPACITY,
            disk_max_age_secs: DEFAULT_DISK_MAX_AGE.as_secs(),
            cache_dir: None,
            high_watermark: memory.high_watermark,
            low_watermark: memory.low_watermark,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.low_watermark
            && self.low_watermark <= self.high_watermark
            && self.high_watermark <= 1.0)
        {
            return Err(Error::Config(format!(
                "watermarks must satisfy 0 < low ({}) <= high ({}) <= 1",
                self.low_watermark, self.high_watermark
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Tier configuration for the coordinator
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            memory: MemoryCacheConfig {
                capacity: self.memory_capacity,
                high_watermark: self.high_watermark,
                low_watermark: self.low_watermark,
            },
            disk: DiskCacheConfig {
                capacity: self.disk_capacity,
                max_age: Duration::from_secs(self.disk_max_age_secs),
            },
        }
    }

    /// HTTP request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// =============================================================================
// Tests
// =============================================================================
