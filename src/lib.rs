#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Forecourt
//!
//! Search core for a vehicle classifieds site: turns untrusted query strings into typed
//! store predicates, keeps listing counts and listing pages in agreement, and guards public
//! form posts with sliding-window rate limits.
//!
//! ## Features
//!
//! - **Filter pipeline**: lenient parameter normalization feeding a deterministic predicate
//!   compiler
//! - **Pagination** with clamped page sizes and a stable `id` tie-break
//! - **Count/list parity**: one compiled predicate set per request, shared by both store calls
//! - **Rate limiting** with pluggable counter stores (in-memory here, Redis in
//!   `forecourt-redis`)
//! - **axum routes** (feature `http`, on by default)
//!
//! ## Quick Start
//!
//! ```rust
//! use forecourt::filter::{compile, normalize, NormalizerConfig, RawParams};
//! use forecourt::paging::{resolve, SortFields};
//!
//! let raw: RawParams = [("make", " Ford "), ("priceMax", "9000"), ("pageSize", "500")]
//!     .into_iter()
//!     .collect();
//!
//! let predicates = compile(&normalize(&raw, &NormalizerConfig::public()));
//! assert_eq!(predicates.cache_key(), r#"status eq "LIVE" & make eq "ford" & price lte 9000"#);
//!
//! let page = resolve(&raw, &SortFields::default());
//! assert_eq!(page.page_size(), forecourt::paging::MAX_PAGE_SIZE);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod forms;
#[cfg(feature = "http")]
pub mod http;
pub mod inventory;
pub mod listing;
pub mod paging;
pub mod rate_limit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ServerConfig};
pub use error::{InventoryError, RateLimitError, StoreError};
pub use filter::{Audience, FilterCriteria, PredicateSet, RawParams};
pub use forms::{FormKind, FormSink, TracingFormSink};
#[cfg(feature = "http")]
pub use http::{admin_router, router, AppState};
pub use inventory::{
    CompiledQuery, InMemoryInventoryStore, InventoryQueryService, InventoryStore, SearchResults,
};
pub use listing::Listing;
pub use paging::{PageSpec, SortFields};
pub use rate_limit::{
    Buckets, ClientIdentity, Decision, FailurePolicy, InMemoryWindowStore, RateLimitBucket,
    RateLimiter, SlidingWindowLimiter, WindowState, WindowStore,
};
