//! Error types shared by the inventory service and the rate limiter.
//!
//! Only two things in this crate can fail: a call into a backing store and a rate-limit check
//! (which is itself a store call). Normalization, compilation and page resolution are total.
use std::time::Duration;

use thiserror::Error;

/// Default budget for a single store call, inventory or counter.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Boxed cause coming from a concrete backend (database driver, Redis client, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a backing store, inventory or counter alike.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The call did not complete within the configured budget.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// The backend is reachable in principle but refused or could not serve the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Backend specific error.
    #[error("store backend error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    /// Wrap any backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Errors surfaced by the inventory query service.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The count or list call against the store failed.
    #[error("inventory store unavailable")]
    StoreUnavailable {
        #[source]
        source: StoreError,
    },
}

impl InventoryError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl From<StoreError> for InventoryError {
    fn from(source: StoreError) -> Self {
        Self::StoreUnavailable { source }
    }
}

/// Errors from a rate-limit check. A denial is not an error; see [`crate::rate_limit::Decision`].
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The counter store could not be consulted.
    #[error("rate limit counter store failed")]
    Store(#[from] StoreError),
}
