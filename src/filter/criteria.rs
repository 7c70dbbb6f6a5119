//! Typed, validated filter criteria.
//!
//! Values of these types are only produced by [`normalize`](super::normalize), so every
//! present field has already been coerced and sanity checked.

use std::collections::BTreeSet;

use crate::listing::{BodyType, FuelType, Status, Transmission};

/// Free text supplied by the caller, trimmed, with a lowercase form for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm {
    display: String,
    folded: String,
}

impl SearchTerm {
    pub(crate) fn new(trimmed: &str) -> Self {
        Self { display: trimmed.to_string(), folded: trimmed.to_lowercase() }
    }

    /// Text as the caller typed it (trimmed).
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Case-folded text used for matching.
    pub fn folded(&self) -> &str {
        &self.folded
    }
}

/// Inclusive range with at least one bound. Invariant: `min <= max` when both are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: Ord + Copy> Range<T> {
    /// Build a range, swapping transposed bounds. Returns `None` when both bounds are absent.
    pub(crate) fn ordered(min: Option<T>, max: Option<T>) -> Option<Self> {
        match (min, max) {
            (None, None) => None,
            (Some(lo), Some(hi)) if lo > hi => Some(Self { min: Some(hi), max: Some(lo) }),
            (min, max) => Some(Self { min, max }),
        }
    }

    pub fn min(&self) -> Option<T> {
        self.min
    }

    pub fn max(&self) -> Option<T> {
        self.max
    }
}

/// Non-empty set of accepted enum variants, iterated in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selection<T: Ord>(BTreeSet<T>);

impl<T: Ord + Copy> Selection<T> {
    pub(crate) fn from_set(set: BTreeSet<T>) -> Option<Self> {
        if set.is_empty() {
            None
        } else {
            Some(Self(set))
        }
    }

    /// The only member, if exactly one was selected.
    pub fn single(&self) -> Option<T> {
        if self.0.len() == 1 {
            self.0.iter().next().copied()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.0.contains(value)
    }
}

/// Status restriction applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Only(Status),
    /// No restriction. Reachable only from an administrator context.
    Any,
}

/// Closed set of filter dimensions understood by the inventory search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterCriteria {
    pub(crate) make: Option<SearchTerm>,
    pub(crate) model: Option<SearchTerm>,
    pub(crate) status: Option<StatusFilter>,
    pub(crate) price: Option<Range<u64>>,
    pub(crate) year: Option<Range<u64>>,
    pub(crate) mileage_max: Option<u64>,
    pub(crate) fuel_types: Option<Selection<FuelType>>,
    pub(crate) body_types: Option<Selection<BodyType>>,
    pub(crate) transmissions: Option<Selection<Transmission>>,
    pub(crate) search_text: Option<SearchTerm>,
}

impl FilterCriteria {
    pub fn make(&self) -> Option<&SearchTerm> {
        self.make.as_ref()
    }

    pub fn model(&self) -> Option<&SearchTerm> {
        self.model.as_ref()
    }

    pub fn status(&self) -> Option<StatusFilter> {
        self.status
    }

    pub fn price(&self) -> Option<Range<u64>> {
        self.price
    }

    pub fn year(&self) -> Option<Range<u64>> {
        self.year
    }

    pub fn mileage_max(&self) -> Option<u64> {
        self.mileage_max
    }

    pub fn fuel_types(&self) -> Option<&Selection<FuelType>> {
        self.fuel_types.as_ref()
    }

    pub fn body_types(&self) -> Option<&Selection<BodyType>> {
        self.body_types.as_ref()
    }

    pub fn transmissions(&self) -> Option<&Selection<Transmission>> {
        self.transmissions.as_ref()
    }

    pub fn search_text(&self) -> Option<&SearchTerm> {
        self.search_text.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_swaps_transposed_bounds() {
        let r = Range::ordered(Some(500u64), Some(100)).unwrap();
        assert_eq!((r.min(), r.max()), (Some(100), Some(500)));
    }

    #[test]
    fn range_keeps_single_bound() {
        let r = Range::ordered(None, Some(9u64)).unwrap();
        assert_eq!((r.min(), r.max()), (None, Some(9)));
        assert!(Range::<u64>::ordered(None, None).is_none());
    }

    #[test]
    fn selection_orders_canonically() {
        let set: BTreeSet<_> = [FuelType::Electric, FuelType::Petrol].into_iter().collect();
        let sel = Selection::from_set(set).unwrap();
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![FuelType::Petrol, FuelType::Electric]);
        assert_eq!(sel.single(), None);
        assert!(Selection::<FuelType>::from_set(BTreeSet::new()).is_none());
    }
}
