//! Feed media cache.
//!
//! Umbrella crate for hosts that want a single dependency. The default
//! `desktop-shims` feature pulls in the service façade with desktop
//! adapters; `cache-only` exposes just the engine for hosts that inject
//! every bridge themselves.

#[cfg(feature = "desktop-shims")]
pub use core_service::{MediaCacheService, PlaybackSource, ServiceError};

#[cfg(feature = "cache-only")]
pub use core_cache as cache;
