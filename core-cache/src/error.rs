//! # Cache Error Types
//!
//! Two channels that are never unified:
//!
//! - [`FetchError`] is the only error a caller of `resolve` ever sees. It is
//!   `Clone` because one fetch outcome fans out to every waiting caller.
//! - [`StorageError`] is produced by tiers and only ever logged by the
//!   manager; a failed write degrades to memory-only availability.
//!
//! [`CacheError`] covers setup faults (bad keys, bad configuration, a durable
//! directory that cannot be opened).

use bridge_traits::BridgeError;
use core_runtime::logging::{redact_url, redact_urls_in};
use thiserror::Error;

/// The transport could not deliver the bytes for a key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network or transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status. `url` is kept whole;
    /// the message shows it without its query.
    #[error("HTTP {status} while fetching {}", redact_url(.url))]
    HttpStatus { status: u16, url: String },

    /// The fetch never produced an outcome (task dropped or panicked).
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<BridgeError> for FetchError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::HttpStatus { status, url } => FetchError::HttpStatus { status, url },
            other => FetchError::Transport(redact_urls_in(&other.to_string())),
        }
    }
}

/// A tier could not read or persist an entry.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Failed to read {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Corrupted entry {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

impl StorageError {
    pub fn write_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        StorageError::WriteFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn read_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        StorageError::ReadFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupted(key: impl Into<String>, reason: impl ToString) -> Self {
        StorageError::Corrupted {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Setup-time failures.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    #[error("Invalid cache configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_status_is_preserved() {
        let error: FetchError = BridgeError::HttpStatus {
            status: 404,
            url: "https://cdn.test/missing.mp4".to_string(),
        }
        .into();

        assert_eq!(error.status(), Some(404));
        assert_eq!(
            error.to_string(),
            "HTTP 404 while fetching https://cdn.test/missing.mp4"
        );
    }

    #[test]
    fn test_signed_urls_stay_out_of_messages() {
        let signed = "https://cdn.test/a.mp4?Expires=1&Signature=secret";
        let status: FetchError = BridgeError::HttpStatus {
            status: 403,
            url: signed.to_string(),
        }
        .into();
        assert_eq!(status.to_string(), "HTTP 403 while fetching https://cdn.test/a.mp4");
        assert!(matches!(status, FetchError::HttpStatus { ref url, .. } if url == signed));

        let transport: FetchError =
            BridgeError::OperationFailed(format!("request to {signed} timed out")).into();
        assert!(!transport.to_string().contains("Signature"));
        assert!(transport.to_string().contains("https://cdn.test/a.mp4 timed out"));
    }

    #[test]
    fn test_other_bridge_errors_become_transport() {
        let error: FetchError = BridgeError::OperationFailed("connection reset".to_string()).into();
        assert!(matches!(error, FetchError::Transport(ref msg) if msg.contains("connection reset")));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_storage_error_wraps_into_cache_error() {
        let error: CacheError = StorageError::write_failed("k", "disk full").into();
        assert_eq!(error.to_string(), "Failed to write k: disk full");
    }
}
