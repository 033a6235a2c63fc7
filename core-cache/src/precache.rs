//! # Precache Scheduler
//!
//! Warms the cache for the videos just ahead of the viewer. Each call to
//! [`PrecacheScheduler::schedule`] is independent: it plans from the window
//! it is given, optionally makes room, and hands every selected key to
//! [`CacheManager::resolve`] in its own task. There is no queue and no
//! cancellation; work started by an earlier call runs to completion.

use bridge_traits::network::NetworkMonitor;
use core_runtime::events::{CoreEvent, EventBus, PrecacheEvent};
use core_runtime::logging::redact_url;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::entry::{CacheKey, CacheTier};
use crate::manager::CacheManager;
use crate::stats::EvictionReport;

/// Default number of upcoming items to warm per call.
pub const DEFAULT_PRECACHE_ITEMS: usize = 3;

/// Default combined footprint allowed after precaching (50 MB).
pub const DEFAULT_PRECACHE_BUDGET_BYTES: u64 = 50 * 1024 * 1024;

/// Default size assumed for an item not yet fetched (10 MB).
pub const DEFAULT_ESTIMATED_ITEM_BYTES: u64 = 10 * 1024 * 1024;

/// Limits applied to one `schedule` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecachePolicy {
    pub max_items: usize,
    /// Only precache on WiFi or wired connections
    pub require_high_bandwidth: bool,
    /// Combined ephemeral + durable footprint to stay under
    pub budget_bytes: u64,
    pub estimated_item_bytes: u64,
}

impl Default for PrecachePolicy {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_PRECACHE_ITEMS,
            require_high_bandwidth: false,
            budget_bytes: DEFAULT_PRECACHE_BUDGET_BYTES,
            estimated_item_bytes: DEFAULT_ESTIMATED_ITEM_BYTES,
        }
    }
}

impl PrecachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_high_bandwidth_required(mut self, required: bool) -> Self {
        self.require_high_bandwidth = required;
        self
    }

    pub fn with_budget(mut self, bytes: u64) -> Self {
        self.budget_bytes = bytes;
        self
    }

    pub fn with_estimated_item_size(mut self, bytes: u64) -> Self {
        self.estimated_item_bytes = bytes;
        self
    }

    /// Space held back for `items` upcoming downloads.
    pub fn reserved_bytes(&self, items: usize) -> u64 {
        self.estimated_item_bytes.saturating_mul(items as u64)
    }
}

/// Why a `schedule` call did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every key in the window is already cached
    NothingToFetch,
    /// High bandwidth was required and the connection is not WiFi/wired
    LowBandwidth,
    /// High bandwidth was required and the connection could not be read
    NetworkUnavailable,
    /// The planning task ended without reporting
    Interrupted,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NothingToFetch => "nothing_to_fetch",
            SkipReason::LowBandwidth => "low_bandwidth",
            SkipReason::NetworkUnavailable => "network_unavailable",
            SkipReason::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one `schedule` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub scheduled: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: Option<SkipReason>,
    /// Budget passes run before fetching, one per tier
    pub eviction: Vec<EvictionReport>,
}

impl PrecacheReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn was_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Handle to one `schedule` call. Dropping it does not stop the work.
pub struct PrecacheHandle {
    task: JoinHandle<PrecacheReport>,
}

impl PrecacheHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for every fetch started by this call to settle.
    pub async fn wait(self) -> PrecacheReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Precache task did not complete");
                PrecacheReport::skipped(SkipReason::Interrupted)
            }
        }
    }
}

/// Coarse activity of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Scheduling,
    Fetching,
}

#[derive(Default)]
struct SchedulerState {
    planning: AtomicUsize,
    fetching: AtomicUsize,
}

struct PhaseGuard {
    state: Arc<SchedulerState>,
    fetching: bool,
}

impl PhaseGuard {
    fn planning(state: &Arc<SchedulerState>) -> Self {
        state.planning.fetch_add(1, Ordering::SeqCst);
        Self {
            state: Arc::clone(state),
            fetching: false,
        }
    }

    fn fetching(state: &Arc<SchedulerState>) -> Self {
        state.fetching.fetch_add(1, Ordering::SeqCst);
        Self {
            state: Arc::clone(state),
            fetching: true,
        }
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        let counter = if self.fetching {
            &self.state.fetching
        } else {
            &self.state.planning
        };
        counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Speculative downloader for upcoming feed items.
#[derive(Clone)]
pub struct PrecacheScheduler {
    manager: CacheManager,
    network: Arc<dyn NetworkMonitor>,
    state: Arc<SchedulerState>,
    event_bus: Option<EventBus>,
}

impl PrecacheScheduler {
    pub fn new(manager: CacheManager, network: Arc<dyn NetworkMonitor>) -> Self {
        Self {
            manager,
            network,
            state: Arc::new(SchedulerState::default()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn phase(&self) -> SchedulerPhase {
        if self.state.planning.load(Ordering::SeqCst) > 0 {
            SchedulerPhase::Scheduling
        } else if self.state.fetching.load(Ordering::SeqCst) > 0 {
            SchedulerPhase::Fetching
        } else {
            SchedulerPhase::Idle
        }
    }

    /// Start warming the cache for `window`, ordered nearest first.
    ///
    /// Returns immediately. Must be called from within a Tokio runtime.
    pub fn schedule(&self, window: Vec<CacheKey>, policy: PrecachePolicy) -> PrecacheHandle {
        let guard = PhaseGuard::planning(&self.state);
        let scheduler = self.clone();
        let task = tokio::spawn(async move { scheduler.run(window, policy, guard).await });
        PrecacheHandle { task }
    }

    async fn run(
        &self,
        window: Vec<CacheKey>,
        policy: PrecachePolicy,
        planning: PhaseGuard,
    ) -> PrecacheReport {
        let window_len = window.len();
        let keys = self.select_candidates(window, policy.max_items).await;

        if keys.is_empty() {
            debug!(window_len, "Precache window already cached");
            return self.skip(SkipReason::NothingToFetch);
        }

        if policy.require_high_bandwidth {
            match self.network.snapshot().await {
                Ok(snapshot) if snapshot.is_high_bandwidth() => {}
                Ok(snapshot) => {
                    debug!(
                        connection = snapshot.connection_type.as_str(),
                        "Skipping precache on low-bandwidth connection"
                    );
                    return self.skip(SkipReason::LowBandwidth);
                }
                Err(e) => {
                    debug!(error = %e, "Skipping precache, network state unavailable");
                    return self.skip(SkipReason::NetworkUnavailable);
                }
            }
        }

        let eviction = self.make_room(keys.len(), &policy).await;

        info!(window_len, scheduled = keys.len(), "Precaching");
        self.emit(PrecacheEvent::Started {
            window_len,
            scheduled: keys.len(),
        });

        let _fetching = PhaseGuard::fetching(&self.state);
        drop(planning);

        let tasks: Vec<_> = keys
            .into_iter()
            .map(|key| {
                let manager = self.manager.clone();
                tokio::spawn(async move {
                    let outcome = manager.resolve(&key).await;
                    (key, outcome)
                })
            })
            .collect();

        let mut report = PrecacheReport {
            scheduled: tasks.len(),
            eviction,
            ..PrecacheReport::default()
        };

        for joined in join_all(tasks).await {
            match joined {
                Ok((_, Ok(_))) => report.succeeded += 1,
                Ok((key, Err(e))) => {
                    report.failed += 1;
                    warn!(key = %redact_url(key.as_str()), error = %e, "Precache fetch failed");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(error = %e, "Precache task did not complete");
                }
            }
        }

        debug!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Precache finished"
        );
        self.emit(PrecacheEvent::Completed {
            succeeded: report.succeeded,
            failed: report.failed,
        });
        report
    }

    /// First `max_items` distinct keys of `window` not held by either tier.
    async fn select_candidates(&self, window: Vec<CacheKey>, max_items: usize) -> Vec<CacheKey> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();

        for key in window {
            if selected.len() >= max_items {
                break;
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            if self.manager.is_available(&key).await {
                continue;
            }
            selected.push(key);
        }

        selected
    }

    /// Evict until both tiers together leave room for the reservation.
    ///
    /// The combined target is split between the tiers by [`split_target`],
    /// so `ephemeral + durable + reserved <= budget` holds afterwards unless
    /// a tier refused a delete.
    async fn make_room(&self, items: usize, policy: &PrecachePolicy) -> Vec<EvictionReport> {
        let reserved = policy.reserved_bytes(items);
        let ephemeral = self.manager.store(CacheTier::Ephemeral).total_size().await;
        let durable = self.manager.store(CacheTier::Durable).total_size().await;
        let current = ephemeral + durable;

        if current.saturating_add(reserved) <= policy.budget_bytes {
            return Vec::new();
        }

        let target = policy.budget_bytes.saturating_sub(reserved);
        let (ephemeral_target, durable_target) = split_target(target, ephemeral, durable);
        debug!(
            current,
            reserved,
            ephemeral_target,
            durable_target,
            "Making room before precache"
        );

        vec![
            self.manager
                .evict_if_over_budget(CacheTier::Ephemeral, ephemeral_target)
                .await,
            self.manager
                .evict_if_over_budget(CacheTier::Durable, durable_target)
                .await,
        ]
    }

    fn skip(&self, reason: SkipReason) -> PrecacheReport {
        self.emit(PrecacheEvent::Skipped {
            reason: reason.to_string(),
        });
        PrecacheReport::skipped(reason)
    }

    fn emit(&self, event: PrecacheEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Precache(event));
        }
    }
}

/// Share a combined byte target between the ephemeral and durable tiers.
///
/// Each tier gets half; a tier already below its half keeps what it holds
/// and hands the slack to the other. The shares never sum past `target`.
fn split_target(target: u64, ephemeral: u64, durable: u64) -> (u64, u64) {
    let half = target / 2;
    if ephemeral <= half {
        (ephemeral, target - ephemeral)
    } else if durable <= target - half {
        (target - durable, durable)
    } else {
        (half, target - half)
    }
}
