use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Outcome of one atomic window operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// The hit was recorded. `in_window` includes it.
    Admitted { in_window: u32 },
    /// The window is full; nothing was recorded.
    Full {
        /// Timestamp (unix millis) of the oldest hit still counted.
        oldest_millis: u64,
    },
}

/// Abstract storage interface for sliding-window counters.
///
/// Implementations must make [`hit`](WindowStore::hit) atomic per key: with several server
/// instances sharing one store, the prune/count/record sequence cannot interleave with another
/// caller's.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record a hit at `now_millis` if fewer than `quota` hits remain in the trailing window.
    ///
    /// * Hits with `ts <= now_millis - window` have aged out and are discarded first.
    /// * If the remaining count is below `quota`, `now_millis` is recorded and `Admitted` is
    ///   returned.
    /// * Otherwise nothing is recorded and `Full` reports the oldest counted hit.
    async fn hit(
        &self,
        key: &str,
        now_millis: u64,
        window: Duration,
        quota: u32,
    ) -> Result<WindowState, StoreError>;
}

pub(crate) fn window_millis(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug)]
struct Log {
    window_millis: u64,
    hits: VecDeque<u64>,
}

impl Log {
    fn prune(&mut self, now_millis: u64) {
        while self.hits.front().is_some_and(|&ts| now_millis.saturating_sub(ts) >= self.window_millis) {
            self.hits.pop_front();
        }
    }
}

/// Simple in-memory window store.
///
/// Suitable for a single instance and for tests; multi-instance deployments need a shared
/// backend.
#[derive(Default, Clone, Debug)]
pub struct InMemoryWindowStore {
    // Map key -> timestamps of admitted hits, oldest first
    data: Arc<Mutex<HashMap<String, Log>>>,
}

impl InMemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop keys whose every hit has aged out. Returns how many keys were removed.
    pub fn sweep(&self, now_millis: u64) -> usize {
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, log| {
            log.prune(now_millis);
            !log.hits.is_empty()
        });
        before - guard.len()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn hit(
        &self,
        key: &str,
        now_millis: u64,
        window: Duration,
        quota: u32,
    ) -> Result<WindowState, StoreError> {
        let window_millis = window_millis(window);
        let mut guard = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let log = guard
            .entry(key.to_string())
            .or_insert_with(|| Log { window_millis, hits: VecDeque::new() });
        log.window_millis = window_millis;
        log.prune(now_millis);

        let counted = u32::try_from(log.hits.len()).unwrap_or(u32::MAX);
        if counted < quota {
            log.hits.push_back(now_millis);
            return Ok(WindowState::Admitted { in_window: counted + 1 });
        }
        let oldest_millis = log.hits.front().copied().unwrap_or(now_millis);
        Ok(WindowState::Full { oldest_millis })
    }
}
