use crate::clock::{Clock, SystemClock};
use crate::error::{RateLimitError, StoreError, DEFAULT_STORE_TIMEOUT};
use crate::rate_limit::bucket::{ClientIdentity, RateLimitBucket};
use crate::rate_limit::store::{window_millis, WindowState, WindowStore};
use crate::rate_limit::{Decision, RateLimiter};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// A sliding-window (rolling log) rate limiter.
///
/// At most `quota` checks are allowed in any trailing `window` for a key. Once full, the key
/// stays denied until its oldest counted hit ages out, which frees exactly one slot; there is
/// no reset at a clock boundary.
///
/// Each store call is bounded by `store_timeout`; an elapsed call is reported as
/// [`StoreError::Timeout`] so the bucket's failure policy can apply.
pub struct SlidingWindowLimiter<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl<S> SlidingWindowLimiter<S>
where
    S: WindowStore + 'static,
{
    /// Create a limiter backed by `store`, reading wall-clock time.
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }
}

impl<S> SlidingWindowLimiter<S>
where
    S: WindowStore + ?Sized + 'static,
{
    /// Create a limiter over a store that is shared elsewhere.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store, clock: Arc::new(SystemClock), store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    /// Replace the time source (tests drive a [`crate::clock::ManualClock`]).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Budget for each counter store call. Panics if zero.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        assert!(timeout > Duration::ZERO, "store timeout must be non-zero");
        self.store_timeout = timeout;
        self
    }
}

impl<S: ?Sized> std::fmt::Debug for SlidingWindowLimiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("clock", &self.clock)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> RateLimiter for SlidingWindowLimiter<S>
where
    S: WindowStore + ?Sized + 'static,
{
    async fn check(
        &self,
        bucket: &RateLimitBucket,
        client: &ClientIdentity,
        sub_key: Option<&str>,
    ) -> Result<Decision, RateLimitError> {
        let key = bucket.key(client, sub_key);
        let now = self.clock.now_millis();
        let quota = bucket.quota();

        let hit = self.store.hit(&key, now, bucket.window(), quota);
        let state = match tokio::time::timeout(self.store_timeout, hit).await {
            Ok(result) => result?,
            Err(_) => return Err(StoreError::Timeout(self.store_timeout).into()),
        };

        match state {
            WindowState::Admitted { in_window } => {
                let remaining = quota.saturating_sub(in_window);
                trace!(target: "forecourt::rate_limit", key = %key, remaining, "allowed");
                Ok(Decision::Allowed { remaining })
            }
            WindowState::Full { oldest_millis } => {
                let frees_at = oldest_millis.saturating_add(window_millis(bucket.window()));
                let wait = Duration::from_millis(frees_at.saturating_sub(now));
                debug!(
                    target: "forecourt::rate_limit",
                    key = %key,
                    bucket = bucket.name(),
                    wait_ms = wait.as_millis() as u64,
                    "rate limit exceeded"
                );
                Ok(Decision::Denied { wait, reason: bucket.name().to_string() })
            }
        }
    }
}
