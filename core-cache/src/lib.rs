//! # Media Cache Engine
//!
//! Two-tier cache and prefetcher for a short-form video feed.
//!
//! ## Overview
//!
//! This crate handles:
//! - Resolving a media URL through an ephemeral tier, a durable tier and the
//!   network, with single-flight fetches and write-through population
//! - Oldest-first eviction against per-tier byte budgets
//! - Speculative downloads for the items just ahead in the feed
//! - Rendition selection from the current network snapshot
//!
//! Host capabilities (fetching, file access, network state, time) come in
//! through `bridge-traits`; nothing here reaches for ambient globals.

pub mod config;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod precache;
pub mod quality;
pub mod stats;
pub mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CacheKey, CacheTier, EntryMeta};
pub use error::{CacheError, FetchError, Result, StorageError};
pub use fetch::{FetchCoordinator, FetchOutcome, InFlightRequest};
pub use manager::CacheManager;
pub use precache::{
    PrecacheHandle, PrecachePolicy, PrecacheReport, PrecacheScheduler, SchedulerPhase, SkipReason,
};
pub use quality::{
    format_label, quality_uri, recommended_buffer_secs, NetworkQualitySelector, QualityLadder,
    QualityLevel, QualityRecommendation, QualityTier,
};
pub use stats::{CacheStats, EvictionReport, TierStats};
pub use store::{DurableStore, EphemeralStore, StoreTier};
