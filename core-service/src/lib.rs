//! Media cache service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (resource fetcher,
//! filesystem, network monitor, clock) into the cache engine and exposes the
//! handful of calls a feed UI needs. Desktop apps typically enable the
//! `desktop-shims` feature, which lets [`CoreConfig`] fall back to the
//! adapters from `bridge-desktop`; mobile hosts inject their own bridges.
//!
//! ```rust,ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::MediaCacheService;
//!
//! let config = CoreConfig::builder().ephemeral_budget_mb(64).build()?;
//! let service = MediaCacheService::bootstrap(config).await?;
//!
//! let bytes = service.resolve("https://cdn.example/reels/42.mp4").await?;
//! service.schedule(upcoming_urls, PrecachePolicy::default());
//! ```

pub mod error;

pub use error::{Result, ServiceError};

use std::sync::Arc;

use bridge_traits::network::{NetworkMonitor, NetworkSnapshot};
use bytes::Bytes;
use core_cache::{
    quality_uri, CacheConfig, CacheKey, CacheManager, CacheStats, DurableStore, EphemeralStore,
    NetworkQualitySelector, PrecacheHandle, PrecachePolicy, PrecacheScheduler,
    QualityLevel, QualityRecommendation, QualityTier, SchedulerPhase,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, QualityEvent};
use core_runtime::logging::{redact_url, LoggingConfig};
use tracing::{debug, info, instrument, warn};

/// What the player should load for a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackSource {
    /// Bytes from the cache (or a fetch that just populated it)
    Cached(Bytes),
    /// The original URL, for the player to stream directly
    Remote(String),
}

impl PlaybackSource {
    pub fn is_cached(&self) -> bool {
        matches!(self, PlaybackSource::Cached(_))
    }
}

/// Primary façade exposed to host applications. Cheap to clone.
#[derive(Clone)]
pub struct MediaCacheService {
    manager: CacheManager,
    scheduler: PrecacheScheduler,
    selector: Arc<NetworkQualitySelector>,
    network: Arc<dyn NetworkMonitor>,
    event_bus: EventBus,
}

impl MediaCacheService {
    /// Open the durable tier and assemble the engine from `config`.
    ///
    /// The durable tier lives in `config.cache_dir` when set, otherwise in
    /// a `media_cache` directory under the file system's cache directory.
    #[instrument(skip(config))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let mut cache_config = CacheConfig::new()
            .with_ephemeral_budget(config.ephemeral_budget_bytes())
            .with_durable_budget(config.durable_budget_bytes())
            .with_integrity_verification(config.verify_integrity);
        if let Some(max_entries) = config.ephemeral_max_entries {
            cache_config = cache_config.with_ephemeral_max_entries(max_entries);
        }

        let durable_root = match &config.cache_dir {
            Some(dir) => dir.clone(),
            None => config
                .file_system
                .get_cache_directory()
                .await
                .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?
                .join(&cache_config.cache_directory),
        };

        let durable = DurableStore::open(
            Arc::clone(&config.file_system),
            durable_root.clone(),
            cache_config.verify_integrity,
        )
        .await
        .map_err(core_cache::CacheError::from)?;
        let ephemeral = EphemeralStore::from_config(&cache_config);

        let event_bus = EventBus::new(config.event_buffer_size);
        let manager = CacheManager::new(
            cache_config,
            Arc::new(ephemeral),
            Arc::new(durable),
            Arc::clone(&config.resource_fetcher),
        )?
        .with_clock(Arc::clone(&config.clock))
        .with_event_bus(event_bus.clone());

        let scheduler = PrecacheScheduler::new(manager.clone(), Arc::clone(&config.network_monitor))
            .with_event_bus(event_bus.clone());

        info!(path = ?durable_root, "Media cache service ready");

        Ok(Self {
            manager,
            scheduler,
            selector: Arc::new(NetworkQualitySelector::default()),
            network: config.network_monitor,
            event_bus,
        })
    }

    /// Logging configuration that forwards to the sink carried by `config`.
    pub fn logging_config(config: &CoreConfig) -> LoggingConfig {
        match &config.logger_sink {
            Some(sink) => LoggingConfig::default().with_logger_sink(Arc::clone(sink)),
            None => LoggingConfig::default(),
        }
    }

    pub fn manager(&self) -> &CacheManager {
        &self.manager
    }

    // ========================================================================
    // Cache
    // ========================================================================

    /// Bytes for `url` from the cache or the network.
    pub async fn resolve(&self, url: &str) -> Result<Bytes> {
        let key = CacheKey::new(url)?;
        Ok(self.manager.resolve(&key).await?)
    }

    pub async fn is_available(&self, url: &str) -> Result<bool> {
        let key = CacheKey::new(url)?;
        Ok(self.manager.is_available(&key).await)
    }

    /// Cached bytes when they can be had, otherwise the URL itself so the
    /// player can stream it.
    pub async fn playback_source(&self, url: &str) -> PlaybackSource {
        match self.resolve(url).await {
            Ok(bytes) => PlaybackSource::Cached(bytes),
            Err(e) => {
                warn!(url = %redact_url(url), error = %e, "Falling back to remote playback");
                PlaybackSource::Remote(url.to_string())
            }
        }
    }

    /// Warm the cache for upcoming feed items. Blank URLs are ignored.
    pub fn schedule<I, S>(&self, window: I, policy: PrecachePolicy) -> PrecacheHandle
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = window
            .into_iter()
            .filter_map(|url| CacheKey::new(url).ok())
            .collect();
        self.scheduler.schedule(keys, policy)
    }

    pub fn precache_phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    pub async fn remove(&self, url: &str) -> Result<bool> {
        let key = CacheKey::new(url)?;
        Ok(self.manager.remove(&key).await)
    }

    pub async fn clear_all(&self) -> usize {
        self.manager.clear_all().await
    }

    pub async fn stats(&self) -> CacheStats {
        self.manager.stats().await
    }

    // ========================================================================
    // Quality
    // ========================================================================

    pub fn select_quality(
        &self,
        snapshot: &NetworkSnapshot,
        low_power_mode: bool,
        forced: Option<QualityLevel>,
    ) -> QualityTier {
        self.selector
            .select(snapshot, low_power_mode, forced)
            .clone()
    }

    /// Tier for the connection reported by the host's network monitor.
    ///
    /// An unreadable snapshot is treated as an unknown connection.
    pub async fn recommend_quality(&self, forced: Option<QualityLevel>) -> QualityTier {
        let snapshot = match self.network.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(error = %e, "Network snapshot unavailable");
                NetworkSnapshot::default()
            }
        };
        let low_power_mode = self.network.is_low_power_mode().await;
        self.select_quality(&snapshot, low_power_mode, forced)
    }

    /// Compare two snapshots and publish a quality change when one is due.
    pub async fn analyze_network_change(
        &self,
        previous: &NetworkSnapshot,
        current: &NetworkSnapshot,
        current_quality: Option<&QualityTier>,
    ) -> QualityRecommendation {
        let low_power_mode = self.network.is_low_power_mode().await;
        let recommendation =
            self.selector
                .analyze_change(previous, current, current_quality, low_power_mode);

        if recommendation.should_change {
            info!(reason = %recommendation.reason, "Quality change recommended");
            let _ = self.event_bus.emit(CoreEvent::Quality(QualityEvent::Changed {
                from: current_quality.map(|q| q.label.clone()),
                to: recommendation.quality.label.clone(),
                reason: recommendation.reason.clone(),
            }));
        }
        recommendation
    }

    /// URL of the `tier` rendition of `url`.
    pub fn rendition_url(&self, url: &str, tier: &QualityTier) -> String {
        quality_uri(url, tier, self.selector.ladder())
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }
}
