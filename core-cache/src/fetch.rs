//! # Fetch Coordinator
//!
//! Collapses concurrent misses for the same key into one network fetch.
//!
//! The first caller for a key becomes the leader: it registers an
//! [`InFlightRequest`] and runs the fetch in a detached task, so a leader
//! that stops waiting does not cancel the work the others are waiting on.
//! Every later caller subscribes to the same request. When the fetch
//! settles the request is removed from the table first, then the outcome is
//! cloned to every subscriber, so the next miss always starts a fresh
//! attempt.

use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::entry::CacheKey;
use crate::error::FetchError;

/// Result of one network population, shared by every waiter.
pub type FetchOutcome = Result<Bytes, FetchError>;

/// A fetch that has started but not yet settled.
#[derive(Debug)]
pub struct InFlightRequest {
    subscribers: Vec<oneshot::Sender<FetchOutcome>>,
    started_at: Instant,
}

impl InFlightRequest {
    fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

type InFlightTable = Arc<Mutex<HashMap<CacheKey, InFlightRequest>>>;

/// Single-flight table keyed by [`CacheKey`].
#[derive(Clone, Default)]
pub struct FetchCoordinator {
    in_flight: InFlightTable,
}

impl FetchCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the outcome of the single fetch for `key`, starting it if no
    /// fetch is in flight.
    ///
    /// `fetcher` runs at most once per in-flight request. It is dropped
    /// unused when the caller joins an existing request.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn fetch<F, Fut>(&self, key: CacheKey, fetcher: F) -> FetchOutcome
    where
        F: FnOnce(CacheKey) -> Fut + Send + 'static,
        Fut: Future<Output = FetchOutcome> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let is_leader = {
            let mut table = self.in_flight.lock();
            match table.get_mut(&key) {
                Some(request) => {
                    request.subscribers.push(tx);
                    debug!(
                        waiters = request.subscribers.len(),
                        "Joined in-flight fetch"
                    );
                    false
                }
                None => {
                    let mut request = InFlightRequest::new();
                    request.subscribers.push(tx);
                    table.insert(key.clone(), request);
                    true
                }
            }
        };

        if is_leader {
            let guard = SettleGuard {
                table: Arc::clone(&self.in_flight),
                key: Some(key.clone()),
            };
            tokio::spawn(async move {
                let mut guard = guard;
                let outcome = AssertUnwindSafe(fetcher(key))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        warn!("Fetch task panicked");
                        Err(FetchError::Aborted("fetch task panicked".to_string()))
                    });
                guard.settle(outcome);
            });
        }

        rx.await.unwrap_or_else(|_| {
            Err(FetchError::Aborted(
                "fetch settled without an outcome".to_string(),
            ))
        })
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.lock().contains_key(key)
    }

    /// Callers currently waiting on the fetch for `key`.
    pub fn waiter_count(&self, key: &CacheKey) -> usize {
        self.in_flight
            .lock()
            .get(key)
            .map_or(0, InFlightRequest::subscriber_count)
    }
}

/// Settles the request exactly once, even if the fetch task is dropped
/// (runtime shutdown) before producing an outcome.
struct SettleGuard {
    table: InFlightTable,
    key: Option<CacheKey>,
}

impl SettleGuard {
    fn settle(&mut self, outcome: FetchOutcome) {
        let Some(key) = self.key.take() else {
            return;
        };

        // Remove before notifying: a subscriber reacting to a failure must
        // be able to start a fresh attempt immediately.
        let request = self.table.lock().remove(&key);
        let Some(request) = request else {
            return;
        };

        debug!(
            waiters = request.subscribers.len(),
            elapsed_ms = request.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Fetch settled"
        );
        for subscriber in request.subscribers {
            // A subscriber that stopped waiting is not an error.
            let _ = subscriber.send(outcome.clone());
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.key.is_some() {
            self.settle(Err(FetchError::Aborted(
                "fetch task dropped before completion".to_string(),
            )));
        }
    }
}
