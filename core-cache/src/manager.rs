//! # Cache Manager
//!
//! Resolves a media URL to bytes through the two tiers and the network:
//!
//! 1. Ephemeral hit: returned as is.
//! 2. Durable hit: promoted into the ephemeral tier with a fresh
//!    `stored_at`, then returned.
//! 3. Miss: a single-flighted fetch whose bytes are written through to
//!    both tiers before any waiter is released.
//!
//! Only fetch failures reach the caller. A tier that cannot store an entry
//! is logged and published as [`CacheEvent::StorageFailed`]; the bytes are
//! still returned.
//!
//! ## Budgets
//!
//! Every successful put is followed by [`CacheManager::evict_if_over_budget`]
//! with the tier's configured budget. Eviction removes the oldest
//! `stored_at` first (ties broken by key) and is serialized per tier.

use bridge_traits::http::ResourceFetcher;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, CacheKey, CacheTier};
use crate::error::{CacheError, FetchError, Result};
use crate::fetch::{FetchCoordinator, FetchOutcome};
use crate::stats::{CacheStats, EvictionReport, TierStats};
use crate::store::StoreTier;

/// Two-tier read-through cache. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CacheManager {
    config: Arc<CacheConfig>,
    ephemeral: Arc<dyn StoreTier>,
    durable: Arc<dyn StoreTier>,
    fetcher: Arc<dyn ResourceFetcher>,
    coordinator: FetchCoordinator,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    ephemeral_eviction: Arc<AsyncMutex<()>>,
    durable_eviction: Arc<AsyncMutex<()>>,
}

impl CacheManager {
    /// Create a manager over injected tiers.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] when the configuration is invalid or a
    /// store is plugged into the wrong tier.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use core_cache::{CacheConfig, CacheManager, DurableStore, EphemeralStore};
    /// use std::sync::Arc;
    ///
    /// let durable = DurableStore::open(fs, root, false).await?;
    /// let manager = CacheManager::new(
    ///     CacheConfig::default(),
    ///     Arc::new(EphemeralStore::new()),
    ///     Arc::new(durable),
    ///     fetcher,
    /// )?;
    /// let bytes = manager.resolve(&"https://cdn.example/v1.mp4".parse()?).await?;
    /// ```
    pub fn new(
        config: CacheConfig,
        ephemeral: Arc<dyn StoreTier>,
        durable: Arc<dyn StoreTier>,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Result<Self> {
        config.validate().map_err(CacheError::Config)?;

        if ephemeral.tier() != CacheTier::Ephemeral {
            return Err(CacheError::Config(
                "ephemeral slot requires an ephemeral store".to_string(),
            ));
        }
        if durable.tier() != CacheTier::Durable {
            return Err(CacheError::Config(
                "durable slot requires a durable store".to_string(),
            ));
        }

        Ok(Self {
            config: Arc::new(config),
            ephemeral,
            durable,
            fetcher,
            coordinator: FetchCoordinator::new(),
            clock: Arc::new(SystemClock),
            event_bus: None,
            ephemeral_eviction: Arc::new(AsyncMutex::new(())),
            durable_eviction: Arc::new(AsyncMutex::new(())),
        })
    }

    /// Use a custom clock for `stored_at` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish cache events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn store(&self, tier: CacheTier) -> &Arc<dyn StoreTier> {
        match tier {
            CacheTier::Ephemeral => &self.ephemeral,
            CacheTier::Durable => &self.durable,
        }
    }

    pub fn budget(&self, tier: CacheTier) -> u64 {
        match tier {
            CacheTier::Ephemeral => self.config.ephemeral_budget_bytes,
            CacheTier::Durable => self.config.durable_budget_bytes,
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Return the bytes for `key`, populating both tiers on a miss.
    ///
    /// Concurrent misses for the same key share one network fetch.
    #[instrument(skip(self, key), fields(key = %redact_url(key.as_str())))]
    pub async fn resolve(&self, key: &CacheKey) -> FetchOutcome {
        if let Some(bytes) = self.lookup(key).await {
            return Ok(bytes);
        }

        debug!("Cache miss");
        self.emit(CacheEvent::Miss {
            url: key.to_string(),
        });

        let manager = self.clone();
        self.coordinator
            .fetch(key.clone(), move |key| async move {
                manager.populate(key).await
            })
            .await
    }

    /// True when either tier holds `key`. Never fetches.
    pub async fn is_available(&self, key: &CacheKey) -> bool {
        self.ephemeral.contains(key).await || self.durable.contains(key).await
    }

    async fn lookup(&self, key: &CacheKey) -> Option<bytes::Bytes> {
        if let Some(entry) = self.ephemeral.get(key).await {
            debug!(size = entry.size, "Ephemeral hit");
            self.emit(CacheEvent::Hit {
                url: key.to_string(),
                tier: CacheTier::Ephemeral,
            });
            return Some(entry.bytes);
        }

        let entry = self.durable.get(key).await?;
        debug!(size = entry.size, "Durable hit, promoting");
        self.emit(CacheEvent::Hit {
            url: key.to_string(),
            tier: CacheTier::Durable,
        });

        let bytes = entry.bytes.clone();
        let promoted = entry.for_tier(CacheTier::Ephemeral, self.clock.unix_timestamp_millis());
        self.store_in(CacheTier::Ephemeral, promoted).await;
        Some(bytes)
    }

    /// Leader-side work of a miss: fetch once, then write through.
    async fn populate(&self, key: CacheKey) -> FetchOutcome {
        // A flight that settled between our lookup and registration has
        // already written the tiers.
        if let Some(bytes) = self.lookup(&key).await {
            return Ok(bytes);
        }

        let resource = match self.fetcher.fetch_resource(key.as_str()).await {
            Ok(resource) => resource,
            Err(e) => {
                let error = FetchError::from(e);
                warn!(
                    key = %redact_url(key.as_str()),
                    status = ?error.status(),
                    error = %error,
                    "Fetch failed"
                );
                self.emit(CacheEvent::FetchFailed {
                    url: key.to_string(),
                    message: error.to_string(),
                });
                return Err(error);
            }
        };

        let stored_at = self.clock.unix_timestamp_millis();
        let entry = CacheEntry::new(
            key.clone(),
            resource.bytes,
            resource.mime_type,
            stored_at,
            CacheTier::Ephemeral,
        );
        let bytes = entry.bytes.clone();

        info!(size = entry.size, mime_type = %entry.mime_type, "Fetched media");
        self.emit(CacheEvent::Fetched {
            url: key.to_string(),
            size: entry.size,
        });

        let durable_copy = entry.for_tier(CacheTier::Durable, stored_at);
        tokio::join!(
            self.store_in(CacheTier::Ephemeral, entry),
            self.store_in(CacheTier::Durable, durable_copy),
        );

        Ok(bytes)
    }

    /// Put into one tier and enforce its budget. Failures are logged only.
    async fn store_in(&self, tier: CacheTier, entry: CacheEntry) {
        let budget = self.budget(tier);
        if entry.size > budget {
            debug!(
                tier = %tier,
                size = entry.size,
                budget,
                "Entry exceeds tier budget, not storing"
            );
            return;
        }

        let url = entry.key.to_string();
        match self.store(tier).put(entry).await {
            Ok(()) => {
                self.evict_if_over_budget(tier, budget).await;
            }
            Err(e) => {
                warn!(tier = %tier, error = %e, "Failed to store entry");
                self.emit(CacheEvent::StorageFailed {
                    url,
                    tier,
                    message: e.to_string(),
                });
            }
        }
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Delete the oldest entries of `tier` until its size is at most
    /// `budget_bytes`.
    ///
    /// Idempotent; concurrent calls for the same tier run one at a time.
    #[instrument(skip(self, tier), fields(tier = %tier))]
    pub async fn evict_if_over_budget(&self, tier: CacheTier, budget_bytes: u64) -> EvictionReport {
        let lock = match tier {
            CacheTier::Ephemeral => &self.ephemeral_eviction,
            CacheTier::Durable => &self.durable_eviction,
        };
        let _guard = lock.lock().await;

        let store = self.store(tier);
        let mut remaining = store.total_size().await;
        let mut report = EvictionReport::new(tier, remaining);
        if remaining <= budget_bytes {
            return report;
        }

        let mut candidates = store.entries().await;
        candidates.sort_by(|a, b| {
            a.stored_at
                .cmp(&b.stored_at)
                .then_with(|| a.key.cmp(&b.key))
        });

        for candidate in candidates {
            if remaining <= budget_bytes {
                break;
            }
            match store.delete(&candidate.key).await {
                Ok(()) => {
                    report.removed_entries += 1;
                    report.freed_bytes += candidate.size;
                }
                Err(e) => {
                    report.failed_deletes += 1;
                    warn!(error = %e, "Eviction delete failed");
                }
            }
            remaining = store.total_size().await;
        }

        report.remaining_bytes = remaining;
        if remaining > budget_bytes {
            warn!(remaining, budget_bytes, "Tier still over budget after eviction");
        }

        if report.removed_entries > 0 {
            info!(
                removed = report.removed_entries,
                freed_bytes = report.freed_bytes,
                remaining,
                "Evicted entries"
            );
            self.emit(CacheEvent::Evicted {
                tier,
                removed_entries: report.removed_entries,
                freed_bytes: report.freed_bytes,
            });
        }

        report
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Remove `key` from both tiers. Returns whether either tier held it.
    #[instrument(skip(self, key), fields(key = %redact_url(key.as_str())))]
    pub async fn remove(&self, key: &CacheKey) -> bool {
        let mut removed = false;
        for tier in [CacheTier::Ephemeral, CacheTier::Durable] {
            let store = self.store(tier);
            if !store.contains(key).await {
                continue;
            }
            match store.delete(key).await {
                Ok(()) => removed = true,
                Err(e) => {
                    warn!(tier = %tier, error = %e, "Failed to remove entry");
                    self.emit(CacheEvent::StorageFailed {
                        url: key.to_string(),
                        tier,
                        message: e.to_string(),
                    });
                }
            }
        }

        if removed {
            self.emit(CacheEvent::Removed {
                url: key.to_string(),
            });
        }
        removed
    }

    /// Empty both tiers, returning the number of entries removed.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> usize {
        let removed = self.ephemeral.clear().await + self.durable.clear().await;
        info!(removed, "Cleared cache");
        self.emit(CacheEvent::Cleared {
            removed_entries: removed,
        });
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            ephemeral: self.tier_stats(CacheTier::Ephemeral).await,
            durable: self.tier_stats(CacheTier::Durable).await,
            in_flight: self.coordinator.in_flight_count(),
        }
    }

    async fn tier_stats(&self, tier: CacheTier) -> TierStats {
        let store = self.store(tier);
        TierStats {
            tier,
            entry_count: store.len().await,
            total_bytes: store.total_size().await,
            budget_bytes: self.budget(tier),
        }
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is not an error.
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}
