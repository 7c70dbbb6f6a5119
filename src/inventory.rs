//! Inventory query service.
//!
//! Runs the filter pipeline once per request and hands the *same* compiled predicate set to
//! both the count and the list call. That is the parity contract: for one request, the total
//! and the page are always computed from identical predicates.
//!
//! The two calls run concurrently and are not snapshot-consistent with each other. If listings
//! change between them the total and the page may disagree; that is accepted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{InventoryError, StoreError};
use crate::filter::{compile, normalize, Audience, NormalizerConfig, PredicateSet, RawParams};
use crate::listing::Listing;
use crate::paging::{resolve, PageSpec, SortFields};

pub mod store;

pub use store::{InMemoryInventoryStore, InventoryStore};

pub use crate::error::DEFAULT_STORE_TIMEOUT;

/// Output of the pure half of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub predicates: PredicateSet,
    pub page: PageSpec,
}

/// One page of results plus the total over all pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub listings: Vec<Listing>,
}

/// Orchestrates normalize → compile → resolve and the store calls.
#[derive(Clone)]
pub struct InventoryQueryService {
    store: Arc<dyn InventoryStore>,
    sort_fields: SortFields,
    store_timeout: Duration,
}

impl std::fmt::Debug for InventoryQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryQueryService")
            .field("sort_fields", &self.sort_fields)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl InventoryQueryService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store, sort_fields: SortFields::default(), store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    pub fn with_sort_fields(mut self, sort_fields: SortFields) -> Self {
        self.sort_fields = sort_fields;
        self
    }

    /// Budget for each store call. Panics if zero.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        assert!(timeout > Duration::ZERO, "store timeout must be non-zero");
        self.store_timeout = timeout;
        self
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Run the pure pipeline. Never fails.
    pub fn prepare(&self, raw: &RawParams, audience: Audience) -> CompiledQuery {
        let criteria = normalize(raw, &NormalizerConfig::from(audience));
        let predicates = compile(&criteria);
        let page = resolve(raw, &self.sort_fields);
        debug!(
            target: "forecourt::inventory",
            predicates = %predicates,
            page = page.page(),
            page_size = page.page_size(),
            "compiled inventory query"
        );
        CompiledQuery { predicates, page }
    }

    /// Count matching listings.
    pub async fn count(&self, raw: &RawParams, audience: Audience) -> Result<u64, InventoryError> {
        let query = self.prepare(raw, audience);
        self.count_compiled(&query.predicates).await
    }

    /// Count and list one page, both from the same predicate set.
    pub async fn search(
        &self,
        raw: &RawParams,
        audience: Audience,
    ) -> Result<SearchResults, InventoryError> {
        let query = self.prepare(raw, audience);
        let (total, listings) = tokio::join!(
            self.count_compiled(&query.predicates),
            self.list_compiled(&query.predicates, &query.page),
        );
        Ok(SearchResults {
            total: total?,
            page: query.page.page(),
            page_size: query.page.page_size(),
            listings: listings?,
        })
    }

    pub async fn count_compiled(&self, predicates: &PredicateSet) -> Result<u64, InventoryError> {
        self.guarded("count", self.store.count(predicates)).await
    }

    pub async fn list_compiled(
        &self,
        predicates: &PredicateSet,
        page: &PageSpec,
    ) -> Result<Vec<Listing>, InventoryError> {
        self.guarded("list", self.store.list(predicates, page)).await
    }

    async fn guarded<T, F>(&self, op: &'static str, call: F) -> Result<T, InventoryError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let outcome = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        };
        outcome.map_err(|source| {
            warn!(target: "forecourt::inventory", op, error = %source, "inventory store call failed");
            InventoryError::StoreUnavailable { source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{BodyType, FuelType, Status, Transmission};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every predicate set it is asked about.
    #[derive(Default)]
    struct RecordingStore {
        seen: Mutex<Vec<PredicateSet>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InventoryStore for RecordingStore {
        async fn count(&self, predicates: &PredicateSet) -> Result<u64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(predicates.clone());
            Ok(0)
        }

        async fn list(&self, predicates: &PredicateSet, _: &PageSpec) -> Result<Vec<Listing>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(predicates.clone());
            Ok(Vec::new())
        }
    }

    struct SlowStore;

    #[async_trait]
    impl InventoryStore for SlowStore {
        async fn count(&self, _: &PredicateSet) -> Result<u64, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        }

        async fn list(&self, _: &PredicateSet, _: &PageSpec) -> Result<Vec<Listing>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn search_passes_identical_predicates_to_both_calls() {
        let store = Arc::new(RecordingStore::default());
        let service = InventoryQueryService::new(store.clone());
        let raw: RawParams =
            [("make", "Audi"), ("priceMin", "abc"), ("yearMin", "2012")].into_iter().collect();

        service.search(&raw, Audience::Public).await.unwrap();

        let seen = store.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out_as_unavailable() {
        let service = InventoryQueryService::new(Arc::new(SlowStore))
            .with_store_timeout(Duration::from_millis(50));
        let err = service.count(&RawParams::new(), Audience::Public).await.unwrap_err();
        match err {
            InventoryError::StoreUnavailable { source: StoreError::Timeout(t) } => {
                assert_eq!(t, Duration::from_millis(50))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn list_still_completes_when_count_fails() {
        // The count half times out; the list half must still have run to completion.
        let service = InventoryQueryService::new(Arc::new(SlowStore))
            .with_store_timeout(Duration::from_millis(50));
        let query = service.prepare(&RawParams::new(), Audience::Public);
        let (count, list) = tokio::join!(
            service.count_compiled(&query.predicates),
            service.list_compiled(&query.predicates, &query.page),
        );
        assert!(count.unwrap_err().is_store_unavailable());
        assert!(list.unwrap().is_empty());
        assert!(service.search(&RawParams::new(), Audience::Public).await.is_err());
    }

    #[tokio::test]
    async fn prepare_reports_page_and_status() {
        let service = InventoryQueryService::new(Arc::new(InMemoryInventoryStore::new()));
        let raw: RawParams = [("page", "-5"), ("status", "DRAFT")].into_iter().collect();
        let q = service.prepare(&raw, Audience::Public);
        assert_eq!(q.page.page(), 1);
        assert_eq!(q.predicates.cache_key(), r#"status eq "LIVE""#);

        let admin = service.prepare(&raw, Audience::Administrator);
        assert_eq!(admin.predicates.cache_key(), r#"status eq "DRAFT""#);
    }

    #[tokio::test]
    async fn search_over_memory_store() {
        let listing = |id, status| Listing {
            id,
            make: "Toyota".into(),
            model: "Yaris".into(),
            status,
            price: 6_000 + id,
            year: 2015,
            mileage: 50_000,
            fuel_type: FuelType::Hybrid,
            body_type: BodyType::Hatchback,
            transmission: Transmission::Automatic,
            listed_at: id,
        };
        let store = InMemoryInventoryStore::with_listings(vec![
            listing(1, Status::Live),
            listing(2, Status::Draft),
            listing(3, Status::Live),
        ]);
        let service = InventoryQueryService::new(Arc::new(store));
        let raw: RawParams = [("sort", "price"), ("pageSize", "1")].into_iter().collect();
        let results = service.search(&raw, Audience::Public).await.unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.listings.iter().map(|l| l.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(results.page_size, 1);
    }
}
