//! Durable tier
//!
//! Entries live in one directory as file pairs:
//!
//! ```text
//! <root>/<sha256(key)>.<digest prefix>.media   payload bytes
//! <root>/<sha256(key)>.meta.json               EntryRecord sidecar
//! ```
//!
//! The payload name carries a prefix of its content digest, so a new
//! version of an entry never overwrites the committed one. The sidecar is
//! written last and is the commit marker: until it lands, the old sidecar
//! still points at the old payload. A payload no sidecar points at is an
//! orphan and is removed on the next [`DurableStore::open`].

use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::logging::redact_url;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::StoreTier;
use crate::entry::{CacheEntry, CacheKey, CacheTier, EntryMeta};
use crate::error::StorageError;

const PAYLOAD_EXTENSION: &str = ".media";
const SIDECAR_EXTENSION: &str = ".meta.json";
const STAGING_EXTENSION: &str = ".partial";
/// Hex digits of the content digest kept in payload file names.
const PAYLOAD_DIGEST_CHARS: usize = 16;

/// Sidecar contents persisted next to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EntryRecord {
    key: CacheKey,
    size: u64,
    mime_type: String,
    stored_at: i64,
    sha256: String,
}

impl EntryRecord {
    /// Payload file stem this record commits to.
    fn payload_stem(&self) -> String {
        let digest = self.sha256.get(..PAYLOAD_DIGEST_CHARS).unwrap_or(&self.sha256);
        format!("{}.{}", storage_stem(&self.key), digest)
    }
}

#[derive(Default)]
struct DurableIndex {
    records: HashMap<CacheKey, EntryRecord>,
    total_size: u64,
}

impl DurableIndex {
    fn insert(&mut self, record: EntryRecord) {
        let size = record.size;
        if let Some(previous) = self.records.insert(record.key.clone(), record) {
            self.total_size = self.total_size.saturating_sub(previous.size);
        }
        self.total_size += size;
    }

    fn remove(&mut self, key: &CacheKey) -> Option<EntryRecord> {
        let removed = self.records.remove(key)?;
        self.total_size = self.total_size.saturating_sub(removed.size);
        Some(removed)
    }
}

/// File-backed tier that survives restarts.
pub struct DurableStore {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
    verify_integrity: bool,
    index: Mutex<DurableIndex>,
}

impl DurableStore {
    /// Open (or create) the store at `root` and rebuild its index.
    ///
    /// Sidecars that fail to parse, sidecars without a payload, orphaned
    /// payloads and leftover staging files are deleted.
    #[instrument(skip(fs))]
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        root: PathBuf,
        verify_integrity: bool,
    ) -> Result<Self, StorageError> {
        let root_label = root.display().to_string();
        fs.create_dir_all(&root)
            .await
            .map_err(|e| StorageError::write_failed(root_label.clone(), e))?;
        let listing = fs
            .list_directory(&root)
            .await
            .map_err(|e| StorageError::read_failed(root_label.clone(), e))?;

        let mut payloads = HashSet::new();
        let mut sidecars = Vec::new();
        let mut stale = Vec::new();

        for path in listing {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(SIDECAR_EXTENSION) {
                sidecars.push((stem.to_string(), path.clone()));
            } else if let Some(stem) = name.strip_suffix(PAYLOAD_EXTENSION) {
                payloads.insert(stem.to_string());
            } else if name.ends_with(STAGING_EXTENSION) {
                stale.push(path.clone());
            }
        }

        let mut index = DurableIndex::default();
        for (stem, sidecar_path) in sidecars {
            match Self::load_record(fs.as_ref(), &sidecar_path).await {
                Some(record)
                    if stem == storage_stem(&record.key)
                        && payloads.contains(&record.payload_stem()) =>
                {
                    payloads.remove(&record.payload_stem());
                    index.insert(record);
                }
                _ => {
                    debug!(path = ?sidecar_path, "Dropping unusable sidecar");
                    stale.push(sidecar_path);
                }
            }
        }

        // Whatever is left has no committed sidecar.
        stale.extend(
            payloads
                .into_iter()
                .map(|stem| root.join(format!("{stem}{PAYLOAD_EXTENSION}"))),
        );

        for path in &stale {
            if let Err(e) = fs.delete_file(path).await {
                warn!(path = ?path, error = %e, "Failed to remove stale cache file");
            }
        }

        info!(
            entries = index.records.len(),
            total_bytes = index.total_size,
            removed = stale.len(),
            "Durable cache opened"
        );

        Ok(Self {
            fs,
            root,
            verify_integrity,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn load_record(fs: &dyn FileSystemAccess, path: &Path) -> Option<EntryRecord> {
        let raw = fs.read_file(path).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    fn payload_path(&self, record: &EntryRecord) -> PathBuf {
        self.root
            .join(format!("{}{PAYLOAD_EXTENSION}", record.payload_stem()))
    }

    fn sidecar_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!("{}{SIDECAR_EXTENSION}", storage_stem(key)))
    }

    /// Forget an entry whose files can no longer be trusted.
    async fn discard(&self, record: &EntryRecord) {
        self.index.lock().remove(&record.key);
        for path in [self.sidecar_path(&record.key), self.payload_path(record)] {
            self.remove_file(&path).await;
        }
    }

    async fn remove_file(&self, path: &Path) {
        if let Err(e) = self.fs.delete_file(path).await {
            warn!(path = ?path, error = %e, "Failed to remove cache file");
        }
    }
}

fn storage_stem(key: &CacheKey) -> String {
    hex::encode(Sha256::digest(key.as_str().as_bytes()))
}

fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[async_trait]
impl StoreTier for DurableStore {
    fn tier(&self) -> CacheTier {
        CacheTier::Durable
    }

    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let record = self.index.lock().records.get(key).cloned()?;

        let bytes = match self.fs.read_file(&self.payload_path(&record)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = StorageError::read_failed(redact_url(key.as_str()), e);
                warn!(error = %error, "Durable read failed, dropping entry");
                self.discard(&record).await;
                return None;
            }
        };

        let fault = if bytes.len() as u64 != record.size {
            Some(format!(
                "expected {} bytes, found {}",
                record.size,
                bytes.len()
            ))
        } else if self.verify_integrity && content_digest(&bytes) != record.sha256 {
            Some("content hash mismatch".to_string())
        } else {
            None
        };

        if let Some(reason) = fault {
            let error = StorageError::corrupted(redact_url(key.as_str()), reason);
            warn!(error = %error, "Dropping corrupted durable entry");
            self.discard(&record).await;
            return None;
        }

        Some(CacheEntry::new(
            record.key,
            bytes,
            record.mime_type,
            record.stored_at,
            CacheTier::Durable,
        ))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), StorageError> {
        let label = redact_url(entry.key.as_str()).to_string();
        let record = EntryRecord {
            key: entry.key.clone(),
            size: entry.size,
            mime_type: entry.mime_type.clone(),
            stored_at: entry.stored_at,
            sha256: content_digest(&entry.bytes),
        };
        let sidecar = serde_json::to_vec(&record)
            .map_err(|e| StorageError::write_failed(label.clone(), e))?;

        let previous = self.index.lock().records.get(&entry.key).cloned();
        let payload_path = self.payload_path(&record);
        let reuses_payload = previous
            .as_ref()
            .is_some_and(|p| self.payload_path(p) == payload_path);

        self.fs
            .write_file(&payload_path, entry.bytes.clone())
            .await
            .map_err(|e| StorageError::write_failed(label.clone(), e))?;

        if let Err(e) = self
            .fs
            .write_file(&self.sidecar_path(&entry.key), Bytes::from(sidecar))
            .await
        {
            // The committed sidecar still names the previous payload.
            if !reuses_payload {
                self.remove_file(&payload_path).await;
            }
            return Err(StorageError::write_failed(label, e));
        }

        debug!(key = %label, size = record.size, "Stored durable entry");
        self.index.lock().insert(record);

        if let Some(previous) = previous.filter(|_| !reuses_payload) {
            self.remove_file(&self.payload_path(&previous)).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StorageError> {
        let Some(record) = self.index.lock().records.get(key).cloned() else {
            return Ok(());
        };

        self.fs
            .delete_file(&self.sidecar_path(key))
            .await
            .map_err(|e| StorageError::write_failed(redact_url(key.as_str()), e))?;
        self.index.lock().remove(key);

        let payload_path = self.payload_path(&record);
        if let Err(e) = self.fs.delete_file(&payload_path).await {
            // Without a sidecar the payload is an orphan; the next open removes it.
            warn!(path = ?payload_path, error = %e, "Failed to delete durable payload");
        }
        Ok(())
    }

    async fn entries(&self) -> Vec<EntryMeta> {
        self.index
            .lock()
            .records
            .values()
            .map(|record| EntryMeta {
                key: record.key.clone(),
                size: record.size,
                stored_at: record.stored_at,
            })
            .collect()
    }

    async fn total_size(&self) -> u64 {
        self.index.lock().total_size
    }

    async fn contains(&self, key: &CacheKey) -> bool {
        self.index.lock().records.contains_key(key)
    }

    async fn len(&self) -> usize {
        self.index.lock().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_stem_is_stable_hex() {
        let key = CacheKey::new("https://cdn.test/a.mp4").unwrap();
        let stem = storage_stem(&key);
        assert_eq!(stem.len(), 64);
        assert_eq!(stem, storage_stem(&key));
        assert_ne!(stem, storage_stem(&CacheKey::new("https://cdn.test/b.mp4").unwrap()));
    }

    #[test]
    fn test_payload_stem_includes_content_digest() {
        let key = CacheKey::new("https://cdn.test/a.mp4").unwrap();
        let record = |payload: &[u8]| EntryRecord {
            key: key.clone(),
            size: payload.len() as u64,
            mime_type: "video/mp4".to_string(),
            stored_at: 1,
            sha256: content_digest(payload),
        };

        let first = record(b"v1").payload_stem();
        assert!(first.starts_with(&storage_stem(&key)));
        assert_eq!(first.len(), 64 + 1 + PAYLOAD_DIGEST_CHARS);
        assert_eq!(first, record(b"v1").payload_stem());
        assert_ne!(first, record(b"v2").payload_stem());
    }

    #[test]
    fn test_index_counter_tracks_replacements() {
        let key = CacheKey::new("https://cdn.test/a.mp4").unwrap();
        let record = |size| EntryRecord {
            key: key.clone(),
            size,
            mime_type: "video/mp4".to_string(),
            stored_at: 1,
            sha256: String::new(),
        };

        let mut index = DurableIndex::default();
        index.insert(record(10));
        index.insert(record(3));
        assert_eq!(index.total_size, 3);
        assert_eq!(index.remove(&key).map(|r| r.size), Some(3));
        assert_eq!(index.total_size, 0);
        assert!(index.remove(&key).is_none());
    }

    #[test]
    fn test_record_serializes_key_as_string() {
        let record = EntryRecord {
            key: CacheKey::new("https://cdn.test/a.mp4").unwrap(),
            size: 1,
            mime_type: "video/mp4".to_string(),
            stored_at: 5,
            sha256: "ab".to_string(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["key"], "https://cdn.test/a.mp4");
        let back: EntryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
