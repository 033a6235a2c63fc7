//! File System Abstraction
//!
//! Backing storage for the durable cache tier. Hosts decide where the cache
//! directory lives; the core only needs whole-file reads and writes inside
//! one flat directory.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Whole-file access to the host's cache area.
///
/// - **Desktop**: `tokio::fs` under the platform cache directory
/// - **iOS/Android**: the sandboxed app cache directory
///
/// `write_file` must not leave a truncated file under the final name if it
/// fails; the durable tier relies on that when it rebuilds its index.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn persist(fs: &dyn FileSystemAccess, name: &str, payload: Bytes) -> Result<PathBuf> {
///     let path = fs.get_cache_directory().await?.join(name);
///     fs.write_file(&path, payload).await?;
///     Ok(path)
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Directory the OS may purge under storage pressure.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Replace the contents of `path`.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Full paths of the entries directly inside `path`.
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
}
