//! Cache keys and entries

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CacheError, Result};

pub use core_runtime::events::CacheTier;

/// Canonical resource URL identifying cached bytes.
///
/// Only surrounding whitespace is trimmed. Callers must supply consistent
/// URLs; two spellings of the same resource are two keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let trimmed = url.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CacheError::InvalidKey(
                "cache key must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Bytes stored in one tier. Replaced wholesale on re-cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bytes: Bytes,
    pub size: u64,
    pub mime_type: String,
    /// Unix milliseconds at which the entry was written to its tier.
    pub stored_at: i64,
    pub tier: CacheTier,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        bytes: Bytes,
        mime_type: impl Into<String>,
        stored_at: i64,
        tier: CacheTier,
    ) -> Self {
        Self {
            key,
            size: bytes.len() as u64,
            bytes,
            mime_type: mime_type.into(),
            stored_at,
            tier,
        }
    }

    /// Copy of this entry as written to another tier at `stored_at`.
    pub fn for_tier(&self, tier: CacheTier, stored_at: i64) -> Self {
        Self {
            tier,
            stored_at,
            ..self.clone()
        }
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            size: self.size,
            stored_at: self.stored_at,
        }
    }
}

/// Enumeration record used by eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub key: CacheKey,
    pub size: u64,
    pub stored_at: i64,
}
