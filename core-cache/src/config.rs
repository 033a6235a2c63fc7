//! Cache configuration

use serde::{Deserialize, Serialize};

const MB: u64 = 1024 * 1024;

/// Configuration for the two-tier media cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Ephemeral tier budget in bytes (default: 100MB)
    pub ephemeral_budget_bytes: u64,

    /// Durable tier budget in bytes (default: 50MB)
    pub durable_budget_bytes: u64,

    /// Optional cap on the number of ephemeral entries
    pub ephemeral_max_entries: Option<usize>,

    /// Verify durable payloads against their SHA-256 on read (default: false)
    pub verify_integrity: bool,

    /// Durable tier directory name, relative to the host cache directory
    pub cache_directory: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ephemeral_budget_bytes: 100 * MB,
            durable_budget_bytes: 50 * MB,
            ephemeral_max_entries: None,
            verify_integrity: false,
            cache_directory: "media_cache".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ephemeral_budget(mut self, bytes: u64) -> Self {
        self.ephemeral_budget_bytes = bytes;
        self
    }

    pub fn with_durable_budget(mut self, bytes: u64) -> Self {
        self.durable_budget_bytes = bytes;
        self
    }

    pub fn with_ephemeral_max_entries(mut self, max_entries: usize) -> Self {
        self.ephemeral_max_entries = Some(max_entries);
        self
    }

    pub fn with_integrity_verification(mut self, enabled: bool) -> Self {
        self.verify_integrity = enabled;
        self
    }

    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.ephemeral_budget_bytes == 0 {
            return Err("ephemeral_budget_bytes must be greater than 0".to_string());
        }

        if self.durable_budget_bytes == 0 {
            return Err("durable_budget_bytes must be greater than 0".to_string());
        }

        if self.ephemeral_max_entries == Some(0) {
            return Err("ephemeral_max_entries must be at least 1 when set".to_string());
        }

        if self.cache_directory.trim().is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        Ok(())
    }
}
