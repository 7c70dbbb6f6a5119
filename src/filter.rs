//! Dynamic search filters.
//!
//! Two stages, both pure:
//!
//! 1. [`normalize`] turns an untyped [`RawParams`] multimap into a closed, typed
//!    [`FilterCriteria`]. It never fails; anything it cannot make sense of is dropped.
//! 2. [`compile`] turns criteria into a deterministic [`PredicateSet`].
//!
//! Nothing after stage one ever sees a raw request string, so the compiled predicates carry no
//! injection surface.
//!
//! ```rust
//! use forecourt::filter::{compile, normalize, NormalizerConfig, RawParams};
//!
//! let raw: RawParams = [("make", "Ford"), ("priceMin", "500"), ("priceMax", "100")]
//!     .into_iter()
//!     .collect();
//! let criteria = normalize(&raw, &NormalizerConfig::public());
//! let price = criteria.price().unwrap();
//! assert_eq!((price.min(), price.max()), (Some(100), Some(500)));
//!
//! let predicates = compile(&criteria);
//! assert_eq!(
//!     predicates.cache_key(),
//!     r#"status eq "LIVE" & make eq "ford" & price gte 100 & price lte 500"#
//! );
//! ```

pub mod criteria;
pub mod normalize;
pub mod params;
pub mod predicate;

pub use criteria::{FilterCriteria, Range, SearchTerm, Selection, StatusFilter};
pub use normalize::{normalize, Audience, NormalizerConfig};
pub use params::{keys, RawParams};
pub use predicate::{compile, Field, Operator, Predicate, PredicateSet, Value};
