//! # Storage Tiers
//!
//! Both tiers share one contract so the manager never needs to know which is
//! which:
//!
//! - [`EphemeralStore`]: process-lifetime memory, backed by `lru::LruCache`
//! - [`DurableStore`]: content-addressed files written through
//!   `FileSystemAccess`, surviving restarts
//!
//! Every implementation keeps `sum(entry.size) == total_size()` by updating
//! its counter under the same lock as its map.

mod durable;
mod ephemeral;

pub use durable::DurableStore;
pub use ephemeral::EphemeralStore;

use async_trait::async_trait;

use crate::entry::{CacheEntry, CacheKey, CacheTier, EntryMeta};
use crate::error::StorageError;

/// Keyed byte storage with size accounting.
#[async_trait]
pub trait StoreTier: Send + Sync {
    /// Which tier this store plays.
    fn tier(&self) -> CacheTier;

    /// Look up an entry. Read faults are reported as absent.
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Insert or replace the entry stored under `entry.key`.
    ///
    /// All-or-nothing: on error the previous contents and the size counter
    /// are unchanged.
    async fn put(&self, entry: CacheEntry) -> Result<(), StorageError>;

    /// Remove an entry. Removing an absent key is a no-op.
    async fn delete(&self, key: &CacheKey) -> Result<(), StorageError>;

    /// Snapshot of every stored entry.
    async fn entries(&self) -> Vec<EntryMeta>;

    /// Sum of the sizes of all stored entries.
    async fn total_size(&self) -> u64;

    /// Presence check that never reads entry bytes.
    async fn contains(&self, key: &CacheKey) -> bool;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove everything, returning how many entries were removed.
    async fn clear(&self) -> usize {
        let mut removed = 0;
        for meta in self.entries().await {
            if self.delete(&meta.key).await.is_ok() {
                removed += 1;
            }
        }
        removed
    }
}
