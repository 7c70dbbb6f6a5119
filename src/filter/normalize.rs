//! Parameter normalizer: untyped request parameters into [`FilterCriteria`].
//!
//! Total by construction. Unknown keys are ignored and malformed values are dropped as if the
//! caller never sent them; each drop is reported as a `ValidationDropped` debug event and never
//! reaches the caller.

use std::collections::BTreeSet;

use tracing::debug;

use super::criteria::{FilterCriteria, Range, SearchTerm, Selection, StatusFilter};
use super::params::{keys, RawParams};
use crate::listing::{Status, Vocabulary};

/// Longest accepted free-text value, in characters.
pub const MAX_TERM_LEN: usize = 100;
/// Oldest model year accepted by the year filter.
pub const MIN_YEAR: u64 = 1900;
/// Newest model year accepted by the year filter.
pub const MAX_YEAR: u64 = 2100;
/// Upper sanity bound for prices.
pub const MAX_PRICE: u64 = 1_000_000_000;
/// Upper sanity bound for mileage.
pub const MAX_MILEAGE: u64 = 10_000_000;

/// Who the query is being run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Audience {
    /// Anonymous visitor; only live listings are ever visible.
    #[default]
    Public,
    /// Authenticated administrator; any status may be requested.
    Administrator,
}

/// Normalizer settings supplied by the caller. Session state is never inspected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizerConfig {
    pub audience: Audience,
}

impl NormalizerConfig {
    pub fn public() -> Self {
        Self { audience: Audience::Public }
    }

    pub fn administrator() -> Self {
        Self { audience: Audience::Administrator }
    }
}

impl From<Audience> for NormalizerConfig {
    fn from(audience: Audience) -> Self {
        Self { audience }
    }
}

/// Parse recognised parameters into typed criteria.
pub fn normalize(raw: &RawParams, config: &NormalizerConfig) -> FilterCriteria {
    let price = Range::ordered(
        first_valid(raw, keys::PRICE_MIN, price),
        first_valid(raw, keys::PRICE_MAX, price),
    );
    let year = Range::ordered(
        first_valid(raw, keys::YEAR_MIN, model_year),
        first_valid(raw, keys::YEAR_MAX, model_year),
    );

    FilterCriteria {
        make: first_valid(raw, keys::MAKE, term),
        model: first_valid(raw, keys::MODEL, term),
        status: status_filter(raw, config.audience),
        price,
        year,
        mileage_max: first_valid(raw, keys::MILEAGE_MAX, mileage),
        fuel_types: selection(raw, keys::FUEL_TYPE),
        body_types: selection(raw, keys::BODY_TYPE),
        transmissions: selection(raw, keys::TRANSMISSION),
        search_text: first_valid(raw, keys::SEARCH_TEXT, term),
    }
}

fn dropped(key: &str, value: &str, reason: &'static str) {
    debug!(
        target: "forecourt::filter",
        key,
        value,
        reason,
        "ValidationDropped: ignoring malformed filter value"
    );
}

/// First value for `key` that parses; malformed occurrences are dropped.
fn first_valid<T>(
    raw: &RawParams,
    key: &str,
    parse: impl Fn(&str) -> Result<T, &'static str>,
) -> Option<T> {
    raw.get_all(key).find_map(|value| match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(reason) => {
            dropped(key, value, reason);
            None
        }
    })
}

fn term(value: &str) -> Result<SearchTerm, &'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("empty");
    }
    if trimmed.chars().count() > MAX_TERM_LEN {
        return Err("too long");
    }
    Ok(SearchTerm::new(trimmed))
}

fn bounded(value: &str, lo: u64, hi: u64) -> Result<u64, &'static str> {
    let n: u64 = value.trim().parse().map_err(|_| "not a non-negative integer")?;
    if n < lo || n > hi {
        return Err("out of range");
    }
    Ok(n)
}

fn price(value: &str) -> Result<u64, &'static str> {
    bounded(value, 0, MAX_PRICE)
}

fn model_year(value: &str) -> Result<u64, &'static str> {
    bounded(value, MIN_YEAR, MAX_YEAR)
}

fn mileage(value: &str) -> Result<u64, &'static str> {
    bounded(value, 1, MAX_MILEAGE)
}

/// Requested status as seen on the wire; `ALL` lifts the restriction.
fn requested_status(value: &str) -> Result<StatusFilter, &'static str> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(StatusFilter::Any);
    }
    Status::parse_loose(value).map(StatusFilter::Only).ok_or("unknown status")
}

fn status_filter(raw: &RawParams, audience: Audience) -> Option<StatusFilter> {
    match audience {
        Audience::Public => {
            if let Some(requested) = raw.first(keys::STATUS) {
                if !requested.trim().eq_ignore_ascii_case(Status::Live.as_str()) {
                    debug!(
                        target: "forecourt::filter",
                        requested,
                        "public audience: status request overridden to LIVE"
                    );
                }
            }
            Some(StatusFilter::Only(Status::Live))
        }
        Audience::Administrator => match first_valid(raw, keys::STATUS, requested_status) {
            Some(StatusFilter::Any) | None => None,
            only => only,
        },
    }
}

/// Multi-select enum parameter: repeated keys and comma separated values both accumulate.
fn selection<T>(raw: &RawParams, key: &str) -> Option<Selection<T>>
where
    T: Vocabulary + Ord,
{
    let mut set = BTreeSet::new();
    for value in raw.get_all(key) {
        for member in value.split(',').map(str::trim).filter(|m| !m.is_empty()) {
            match T::parse_loose(member) {
                Some(variant) => {
                    set.insert(variant);
                }
                None => dropped(key, member, "unknown variant"),
            }
        }
    }
    Selection::from_set(set)
}
