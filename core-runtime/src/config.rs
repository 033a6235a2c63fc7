//! # Core Configuration Module
//!
//! Builder-based configuration for the media cache core.
//!
//! ## Overview
//!
//! `CoreConfig` holds every host capability the cache needs plus the tier
//! budgets. The builder fails fast with actionable errors when a required
//! capability is missing.
//!
//! ## Required Capabilities
//!
//! - `ResourceFetcher` - Fetches media bytes (desktop default: reqwest)
//! - `FileSystemAccess` - Backs the durable tier (desktop default: tokio fs)
//! - `NetworkMonitor` - Connection snapshot for precache and quality
//!   decisions (desktop default: TCP connect check)
//!
//! ## Optional Capabilities
//!
//! - `Clock` - Defaults to `SystemClock`
//! - `LoggerSink` - Mirrors logs into the host pipeline
//!
//! When the `desktop-shims` feature is enabled, the desktop adapters are
//! injected automatically for any required capability not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .ephemeral_budget_mb(64)
//!     .resource_fetcher(Arc::new(MyFetcher))
//!     .file_system(Arc::new(MyFileSystem))
//!     .network_monitor(Arc::new(MyNetworkMonitor))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    Clock, FileSystemAccess, LoggerSink, NetworkMonitor, ResourceFetcher, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Default ephemeral tier budget.
pub const DEFAULT_EPHEMERAL_BUDGET_MB: u64 = 100;
/// Default durable tier budget.
pub const DEFAULT_DURABLE_BUDGET_MB: u64 = 50;

const MAX_BUDGET_MB: u64 = 100_000;

/// Core configuration for the media cache.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for the durable tier. When unset, a `media_cache` directory under
    /// the file system's cache directory is used.
    pub cache_dir: Option<PathBuf>,

    pub ephemeral_budget_mb: u64,
    pub durable_budget_mb: u64,

    /// Optional cap on the number of ephemeral entries
    pub ephemeral_max_entries: Option<usize>,

    /// Verify durable payload checksums on read
    pub verify_integrity: bool,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    pub resource_fetcher: Arc<dyn ResourceFetcher>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub network_monitor: Arc<dyn NetworkMonitor>,
    pub clock: Arc<dyn Clock>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("ephemeral_budget_mb", &self.ephemeral_budget_mb)
            .field("durable_budget_mb", &self.durable_budget_mb)
            .field("ephemeral_max_entries", &self.ephemeral_max_entries)
            .field("verify_integrity", &self.verify_integrity)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("resource_fetcher", &"ResourceFetcher { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("network_monitor", &"NetworkMonitor { ... }")
            .field("clock", &"Clock { ... }")
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Ephemeral budget in bytes.
    pub fn ephemeral_budget_bytes(&self) -> u64 {
        self.ephemeral_budget_mb.saturating_mul(1024 * 1024)
    }

    /// Durable budget in bytes.
    pub fn durable_budget_bytes(&self) -> u64 {
        self.durable_budget_mb.saturating_mul(1024 * 1024)
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Budgets are non-zero and below 100 GB
    /// - The entry cap, when set, is non-zero
    /// - The cache directory, when set, is not empty
    /// - The event buffer is non-zero
    pub fn validate(&self) -> Result<()> {
        for (name, budget) in [
            ("Ephemeral", self.ephemeral_budget_mb),
            ("Durable", self.durable_budget_mb),
        ] {
            if budget == 0 {
                return Err(Error::Config(format!(
                    "{} budget must be greater than 0 MB",
                    name
                )));
            }
            if budget > MAX_BUDGET_MB {
                return Err(Error::Config(format!(
                    "{} budget exceeds maximum of 100GB (100,000 MB)",
                    name
                )));
            }
        }

        if self.ephemeral_max_entries == Some(0) {
            return Err(Error::Config(
                "Ephemeral entry cap must be greater than 0 when set".to_string(),
            ));
        }

        if let Some(dir) = &self.cache_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config("Cache directory cannot be empty".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_fetcher() -> Result<Arc<dyn ResourceFetcher>> {
    use bridge_desktop::ReqwestResourceFetcher;

    let fetcher = ReqwestResourceFetcher::new().map_err(|e| Error::CapabilityMissing {
        capability: "ResourceFetcher".to_string(),
        message: format!("Default desktop fetcher could not be created: {}", e),
    })?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_fetcher() -> Result<Arc<dyn ResourceFetcher>> {
    Err(Error::CapabilityMissing {
        capability: "ResourceFetcher".to_string(),
        message: "No resource fetcher provided. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestResourceFetcher. \
                 Mobile: inject the platform-native HTTP adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(cache_dir: Option<&PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs = match cache_dir {
        Some(dir) => TokioFileSystem::with_cache_directory(dir.clone()),
        None => TokioFileSystem::new(),
    };
    Ok(Arc::new(fs))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_cache_dir: Option<&PathBuf>) -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "No file system provided for the durable cache tier. \
                 Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
                 Mobile: inject sandboxed cache-directory access."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    use bridge_desktop::DesktopNetworkMonitor;

    Ok(Arc::new(DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Err(Error::CapabilityMissing {
        capability: "NetworkMonitor".to_string(),
        message: "No network monitor provided. \
                 Desktop: enable the 'desktop-shims' feature to use DesktopNetworkMonitor. \
                 Mobile: feed a HostNetworkMonitor from NetInfo/ConnectivityManager."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    ephemeral_budget_mb: Option<u64>,
    durable_budget_mb: Option<u64>,
    ephemeral_max_entries: Option<usize>,
    verify_integrity: bool,
    event_buffer_size: Option<usize>,
    resource_fetcher: Option<Arc<dyn ResourceFetcher>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn Clock>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
}

impl CoreConfigBuilder {
    /// Sets the durable tier directory.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn ephemeral_budget_mb(mut self, size_mb: u64) -> Self {
        self.ephemeral_budget_mb = Some(size_mb);
        self
    }

    pub fn durable_budget_mb(mut self, size_mb: u64) -> Self {
        self.durable_budget_mb = Some(size_mb);
        self
    }

    pub fn ephemeral_max_entries(mut self, max_entries: usize) -> Self {
        self.ephemeral_max_entries = Some(max_entries);
        self
    }

    pub fn verify_integrity(mut self, enabled: bool) -> Self {
        self.verify_integrity = enabled;
        self
    }

    pub fn event_buffer_size(mut self, capacity: usize) -> Self {
        self.event_buffer_size = Some(capacity);
        self
    }

    pub fn resource_fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.resource_fetcher = Some(fetcher);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required capability is absent
    ///   and no desktop default is available
    /// - [`Error::Config`] when a setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let resource_fetcher = match self.resource_fetcher {
            Some(fetcher) => fetcher,
            None => provide_default_fetcher()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(self.cache_dir.as_ref())?,
        };

        let network_monitor = match self.network_monitor {
            Some(monitor) => monitor,
            None => provide_default_network_monitor()?,
        };

        let config = CoreConfig {
            cache_dir: self.cache_dir,
            ephemeral_budget_mb: self
                .ephemeral_budget_mb
                .unwrap_or(DEFAULT_EPHEMERAL_BUDGET_MB),
            durable_budget_mb: self.durable_budget_mb.unwrap_or(DEFAULT_DURABLE_BUDGET_MB),
            ephemeral_max_entries: self.ephemeral_max_entries,
            verify_integrity: self.verify_integrity,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            resource_fetcher,
            file_system,
            network_monitor,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logger_sink: self.logger_sink,
        };

        config.validate()?;

        Ok(config)
    }
}
