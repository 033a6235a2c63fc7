//! Cache, precache and quality notifications.
//!
//! The cache manager, precache scheduler and service layer publish
//! [`CoreEvent`]s on a shared [`EventBus`] (a `tokio::sync::broadcast`
//! channel). Hosts subscribe to drive UI or diagnostics instead of polling
//! cache statistics.
//!
//! Publishing is fire-and-forget: a send with no subscribers is an error
//! from `broadcast`, and publishers discard it. A subscriber that falls more
//! than the channel capacity behind sees `RecvError::Lagged(n)` once and then
//! resumes with the oldest retained event.
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CacheTier, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! let _ = bus.emit(CoreEvent::Cache(CacheEvent::Hit {
//!     url: "https://cdn.test/a.mp4".to_string(),
//!     tier: CacheTier::Ephemeral,
//! }));
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Cache(_))));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

use tokio::sync::broadcast::error::TryRecvError;

/// Channel capacity used by [`EventBus::default`].
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Shared Types
// ============================================================================

/// Storage tier of the media cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    /// Fast in-process memory, lost on restart
    Ephemeral,
    /// Slower local storage that survives restarts
    Durable,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Ephemeral => "ephemeral",
            CacheTier::Durable => "durable",
        }
    }
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Cache(CacheEvent),
    Precache(PrecacheEvent),
    Quality(QualityEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Precache(e) => e.description(),
            CoreEvent::Quality(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::FetchFailed { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::StorageFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::Evicted { .. })
            | CoreEvent::Cache(CacheEvent::Cleared { .. })
            | CoreEvent::Precache(PrecacheEvent::Completed { .. })
            | CoreEvent::Quality(QualityEvent::Changed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the cache manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// A resolve was served from a local tier.
    Hit { url: String, tier: CacheTier },
    /// Neither tier held the resource.
    Miss { url: String },
    /// The network fetch succeeded and the bytes were stored.
    Fetched { url: String, size: u64 },
    /// The network fetch failed; every waiting caller saw the error.
    FetchFailed { url: String, message: String },
    /// A tier write failed. The caller still got the bytes.
    StorageFailed {
        url: String,
        tier: CacheTier,
        message: String,
    },
    /// Budget enforcement removed entries from a tier.
    Evicted {
        tier: CacheTier,
        removed_entries: usize,
        freed_bytes: u64,
    },
    /// A single resource was removed on request.
    Removed { url: String },
    /// Both tiers were emptied.
    Cleared { removed_entries: usize },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Hit { .. } => "Served from cache",
            CacheEvent::Miss { .. } => "Cache miss",
            CacheEvent::Fetched { .. } => "Resource fetched and cached",
            CacheEvent::FetchFailed { .. } => "Resource fetch failed",
            CacheEvent::StorageFailed { .. } => "Cache write failed",
            CacheEvent::Evicted { .. } => "Entries evicted to stay within budget",
            CacheEvent::Removed { .. } => "Resource removed from cache",
            CacheEvent::Cleared { .. } => "Cache cleared",
        }
    }
}

// ============================================================================
// Precache Events
// ============================================================================

/// Events emitted by the precache scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PrecacheEvent {
    /// Downloads were spawned for `scheduled` of the `window_len` keys.
    Started { window_len: usize, scheduled: usize },
    /// The call was skipped without spawning anything.
    Skipped { reason: String },
    /// Every spawned download settled.
    Completed { succeeded: usize, failed: usize },
}

impl PrecacheEvent {
    fn description(&self) -> &str {
        match self {
            PrecacheEvent::Started { .. } => "Precache started",
            PrecacheEvent::Skipped { .. } => "Precache skipped",
            PrecacheEvent::Completed { .. } => "Precache completed",
        }
    }
}

// ============================================================================
// Quality Events
// ============================================================================

/// Events emitted when the recommended rendition changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QualityEvent {
    Changed {
        from: Option<String>,
        to: String,
        reason: String,
    },
}

impl QualityEvent {
    fn description(&self) -> &str {
        match self {
            QualityEvent::Changed { .. } => "Recommended quality changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Shared publisher handle. Clones publish into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` bounds how far a subscriber may fall behind before it
    /// starts losing events.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Number of subscribers reached, or the event back when nobody listens.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Events published from now on. Nothing is replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Filtered Subscription
// ============================================================================

type Predicate = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Subscription that drops events failing a predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::default();
/// let quality_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Quality(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    predicate: Option<Predicate>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            predicate: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    fn wants(&self, event: &CoreEvent) -> bool {
        match &self.predicate {
            Some(predicate) => predicate(event),
            None => true,
        }
    }

    /// Wait for the next accepted event.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.wants(&event) {
                return Ok(event);
            }
        }
    }

    /// Next accepted event already in the channel, if any.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(missed)) => return Some(Err(RecvError::Lagged(missed))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            };
            if self.wants(&event) {
                return Some(Ok(event));
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
