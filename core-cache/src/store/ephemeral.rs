//! In-memory tier

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use tracing::debug;

use super::StoreTier;
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheKey, CacheTier, EntryMeta};
use crate::error::StorageError;

struct EphemeralState {
    entries: LruCache<CacheKey, CacheEntry>,
    total_size: u64,
}

/// Process-lifetime tier.
///
/// Reads use `peek`, so the LRU order tracks insertion rather than access and
/// the optional entry cap displaces the oldest write.
pub struct EphemeralStore {
    state: Mutex<EphemeralState>,
}

impl EphemeralStore {
    /// Store without an entry cap; only the byte budget bounds it.
    pub fn new() -> Self {
        Self::from_cache(LruCache::unbounded())
    }

    /// Store holding at most `max_entries` entries.
    pub fn with_max_entries(max_entries: NonZeroUsize) -> Self {
        Self::from_cache(LruCache::new(max_entries))
    }

    /// Store honouring the entry cap of `config`, if any.
    pub fn from_config(config: &CacheConfig) -> Self {
        match config.ephemeral_max_entries.and_then(NonZeroUsize::new) {
            Some(max_entries) => Self::with_max_entries(max_entries),
            None => Self::new(),
        }
    }

    fn from_cache(entries: LruCache<CacheKey, CacheEntry>) -> Self {
        Self {
            state: Mutex::new(EphemeralState {
                entries,
                total_size: 0,
            }),
        }
    }
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreTier for EphemeralStore {
    fn tier(&self) -> CacheTier {
        CacheTier::Ephemeral
    }

    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.state.lock().entries.peek(key).cloned()
    }

    async fn put(&self, mut entry: CacheEntry) -> Result<(), StorageError> {
        entry.tier = CacheTier::Ephemeral;
        let size = entry.size;
        let key = entry.key.clone();

        let mut state = self.state.lock();
        // `push` hands back either the replaced value for this key or the
        // entry displaced by the cap.
        if let Some((displaced_key, displaced)) = state.entries.push(key.clone(), entry) {
            state.total_size = state.total_size.saturating_sub(displaced.size);
            if displaced_key != key {
                debug!(key = %displaced_key, size = displaced.size, "Entry cap displaced ephemeral entry");
            }
        }
        state.total_size += size;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if let Some(removed) = state.entries.pop(key) {
            state.total_size = state.total_size.saturating_sub(removed.size);
        }
        Ok(())
    }

    async fn entries(&self) -> Vec<EntryMeta> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(_, entry)| entry.meta())
            .collect()
    }

    async fn total_size(&self) -> u64 {
        self.state.lock().total_size
    }

    async fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains(key)
    }

    async fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    async fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.total_size = 0;
        removed
    }
}
