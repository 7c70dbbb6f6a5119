//! Sliding-window limits for the public form endpoints.
//!
//! A check names a [`RateLimitBucket`] (contact, newsletter or general, taken from the
//! [`Buckets`] catalogue built at startup), the [`ClientIdentity`] the request is attributed
//! to, and an optional sub-key. The answer is a [`Decision`].
//!
//! Three pieces cooperate:
//! - `RateLimitLayer` (feature `http`) sits on a route, turns denials into 429 responses and
//!   applies the bucket's [`FailurePolicy`] when the counters cannot be read.
//! - [`strategies::SlidingWindowLimiter`] converts the stored window into remaining quota or
//!   a wait time.
//! - [`store::WindowStore`] keeps the admission timestamps. Server instances that must agree
//!   on counts share one store (see `forecourt-redis`); the in-memory store is per process.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RateLimitError;

pub mod bucket;
#[cfg(feature = "http")]
pub mod middleware;
pub mod store;
pub mod strategies;

pub use bucket::{
    BucketError, Buckets, ClientIdentity, FailurePolicy, RateLimitBucket, DEFAULT_GENERAL_FORMS,
};
#[cfg(feature = "http")]
pub use middleware::{RateLimitLayer, RateLimitService};
pub use store::{InMemoryWindowStore, WindowState, WindowStore};
pub use strategies::SlidingWindowLimiter;

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Admitted and recorded.
    Allowed {
        /// Admissions left in the trailing window after this one (`x-ratelimit-remaining`).
        remaining: u32,
    },
    /// Window full; nothing was recorded.
    Denied {
        /// Time until the oldest counted hit ages out and frees a slot (`Retry-After`).
        wait: Duration,
        /// Bucket that denied the request.
        reason: String,
    },
}

impl Decision {
    /// True for [`Decision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Counts requests against buckets.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request from `client` against `bucket`, optionally narrowed by `sub_key`.
    async fn check(
        &self,
        bucket: &RateLimitBucket,
        client: &ClientIdentity,
        sub_key: Option<&str>,
    ) -> Result<Decision, RateLimitError>;
}
