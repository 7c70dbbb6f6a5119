use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::filter::PredicateSet;
use crate::listing::Listing;
use crate::paging::PageSpec;

/// Query interface of the relational store holding listings.
///
/// Implementations must support the `eq`, `gte`, `lte`, `contains` and `in` operators and
/// evaluate a [`PredicateSet`] as a conjunction. `list` must order by
/// [`PageSpec::sort_keys`] and apply `offset`/`page_size` after filtering.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Number of listings matching every predicate.
    async fn count(&self, predicates: &PredicateSet) -> Result<u64, StoreError>;

    /// One page of matching listings.
    async fn list(
        &self,
        predicates: &PredicateSet,
        page: &PageSpec,
    ) -> Result<Vec<Listing>, StoreError>;
}

/// In-process store evaluating predicates with [`crate::filter::Predicate::matches`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryInventoryStore {
    listings: Arc<RwLock<Vec<Listing>>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listings(listings: Vec<Listing>) -> Self {
        Self { listings: Arc::new(RwLock::new(listings)) }
    }

    /// Load listings from a JSON array.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Ok(Self::with_listings(serde_json::from_slice(bytes)?))
    }

    /// Insert a listing, replacing any with the same id.
    pub fn upsert(&self, listing: Listing) {
        let mut guard = self.listings.write().unwrap_or_else(PoisonError::into_inner);
        match guard.iter_mut().find(|l| l.id == listing.id) {
            Some(existing) => *existing = listing,
            None => guard.push(listing),
        }
    }

    pub fn remove(&self, id: u64) -> Option<Listing> {
        let mut guard = self.listings.write().unwrap_or_else(PoisonError::into_inner);
        let pos = guard.iter().position(|l| l.id == id)?;
        Some(guard.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.listings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn count(&self, predicates: &PredicateSet) -> Result<u64, StoreError> {
        let guard = self.listings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.iter().filter(|l| predicates.matches(l)).count() as u64)
    }

    async fn list(
        &self,
        predicates: &PredicateSet,
        page: &PageSpec,
    ) -> Result<Vec<Listing>, StoreError> {
        let mut matching: Vec<Listing> = {
            let guard = self.listings.read().unwrap_or_else(PoisonError::into_inner);
            guard.iter().filter(|l| predicates.matches(l)).cloned().collect()
        };
        matching.sort_by(|a, b| page.compare(a, b));

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(page.page_size() as usize).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{BodyType, FuelType, Status, Transmission};
    use crate::paging::{SortDirection, SortField, SortKey};

    fn listing(id: u64, price: u64) -> Listing {
        Listing {
            id,
            make: "Mazda".into(),
            model: "MX-5".into(),
            status: Status::Live,
            price,
            year: 2019,
            mileage: 20_000,
            fuel_type: FuelType::Petrol,
            body_type: BodyType::Convertible,
            transmission: Transmission::Manual,
            listed_at: id,
        }
    }

    #[tokio::test]
    async fn ties_on_primary_key_break_by_id() {
        let store = InMemoryInventoryStore::with_listings(vec![
            listing(4, 9_000),
            listing(2, 9_000),
            listing(3, 8_000),
            listing(1, 9_000),
        ]);
        let by_price = SortKey::new(SortField::Price, SortDirection::Asc);
        let all = PredicateSet::default();

        let first = store.list(&all, &PageSpec::new(1, 2, by_price)).await.unwrap();
        let second = store.list(&all, &PageSpec::new(2, 2, by_price)).await.unwrap();
        let ids: Vec<_> = first.iter().chain(second.iter()).map(|l| l.id).collect();
        assert_eq!(ids, vec![3, 1, 2, 4]);
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_deletes() {
        let store = InMemoryInventoryStore::new();
        store.upsert(listing(1, 100));
        store.upsert(listing(1, 200));
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove(1).map(|l| l.price), Some(200));
        assert!(store.is_empty());
        assert_eq!(store.count(&PredicateSet::default()).await.unwrap(), 0);
    }

    #[test]
    fn loads_json_seed() {
        let json = br#"[{"id":1,"make":"Kia","model":"Ceed","status":"LIVE","price":7000,
            "year":2016,"mileage":70000,"fuelType":"diesel","bodyType":"estate",
            "transmission":"manual","listedAt":0}]"#;
        let store = InMemoryInventoryStore::from_json(json).unwrap();
        assert_eq!(store.len(), 1);
        assert!(InMemoryInventoryStore::from_json(b"{}").is_err());
    }
}
