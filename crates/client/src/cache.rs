//! Shared query cache for product detail and product list reads.
//!
//! Every view reads through this cache so a mutation confirmed in one place
//! is visible everywhere. Entries expire after `max_age` and can be
//! invalidated explicitly; an invalidated entry is never served.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use roastah_products::{ProductId, ProductRecord};

use crate::api::{ApiError, ProductApi};

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    cached_at: DateTime<Utc>,
    invalidated: bool,
}

impl<T: Clone> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            invalidated: false,
        }
    }

    fn fresh(&self, max_age: Option<Duration>) -> Option<T> {
        if self.invalidated {
            return None;
        }
        if let Some(max) = max_age {
            let age = Utc::now().signed_duration_since(self.cached_at);
            if age.to_std().unwrap_or_default() > max {
                return None;
            }
        }
        Some(self.value.clone())
    }
}

#[derive(Debug, Default)]
struct CacheState {
    products: HashMap<ProductId, Entry<ProductRecord>>,
    list: Option<Entry<Vec<ProductRecord>>>,
}

impl CacheState {
    /// True when the cache already holds a newer version than `record`.
    fn is_newer_than(&self, record: &ProductRecord) -> bool {
        self.products
            .get(&record.id)
            .is_some_and(|e| !e.invalidated && e.value.version > record.version)
    }

    fn invalidate_list(&mut self) {
        if let Some(list) = self.list.as_mut() {
            list.invalidated = true;
        }
    }
}

/// Outcome of writing a mutation's confirmed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Applied,
    /// The cache already held a newer version; the response was dropped.
    Stale,
}

/// In-memory cache of product queries, shared behind an `Arc`.
#[derive(Debug, Default)]
pub struct QueryCache {
    inner: RwLock<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached product, if present, not invalidated and younger than `max_age`.
    pub fn product(&self, id: ProductId, max_age: Option<Duration>) -> Option<ProductRecord> {
        let state = self.inner.read().ok()?;
        state.products.get(&id)?.fresh(max_age)
    }

    pub fn products(&self, max_age: Option<Duration>) -> Option<Vec<ProductRecord>> {
        let state = self.inner.read().ok()?;
        state.list.as_ref()?.fresh(max_age)
    }

    /// Store a fetched record unless the cache already holds a newer version.
    pub fn put_product(&self, record: ProductRecord) -> bool {
        let Ok(mut state) = self.inner.write() else {
            return false;
        };
        if state.is_newer_than(&record) {
            tracing::debug!(product_id = %record.id, "ignoring older product fetch");
            return false;
        }
        state.products.insert(record.id, Entry::new(record));
        true
    }

    pub fn put_list(&self, records: Vec<ProductRecord>) {
        if let Ok(mut state) = self.inner.write() {
            state.list = Some(Entry::new(records));
        }
    }

    /// Write a mutation's confirmed record.
    ///
    /// On success the detail entry is replaced, the matching list row is
    /// patched in place and the list is marked for refetch.
    pub fn apply_confirmed(&self, record: ProductRecord) -> CacheWrite {
        let Ok(mut state) = self.inner.write() else {
            return CacheWrite::Stale;
        };
        if state.is_newer_than(&record) {
            tracing::warn!(
                product_id = %record.id,
                version = record.version,
                "dropping stale mutation response"
            );
            return CacheWrite::Stale;
        }

        let id = record.id;
        if let Some(list) = state.list.as_mut() {
            if let Some(row) = list.value.iter_mut().find(|r| r.id == id) {
                *row = record.clone();
            }
            list.invalidated = true;
        }
        state.products.insert(id, Entry::new(record));
        CacheWrite::Applied
    }

    pub fn invalidate_product(&self, id: ProductId) {
        if let Ok(mut state) = self.inner.write() {
            if let Some(entry) = state.products.get_mut(&id) {
                entry.invalidated = true;
            }
        }
    }

    pub fn invalidate_list(&self) {
        if let Ok(mut state) = self.inner.write() {
            state.invalidate_list();
        }
    }

    /// Drop a deleted product from the detail entries and the list.
    pub fn remove_product(&self, id: ProductId) {
        if let Ok(mut state) = self.inner.write() {
            state.products.remove(&id);
            if let Some(list) = state.list.as_mut() {
                list.value.retain(|r| r.id != id);
                list.invalidated = true;
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.write() {
            state.products.clear();
            state.list = None;
        }
    }
}

/// Reads products through the cache, fetching on miss.
#[derive(Clone)]
pub struct ProductQueries {
    api: Arc<dyn ProductApi>,
    cache: Arc<QueryCache>,
    max_age: Option<Duration>,
}

impl ProductQueries {
    pub fn new(api: Arc<dyn ProductApi>, cache: Arc<QueryCache>, max_age: Option<Duration>) -> Self {
        Self {
            api,
            cache,
            max_age,
        }
    }

    pub fn api(&self) -> &Arc<dyn ProductApi> {
        &self.api
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn product(&self, id: ProductId) -> Result<ProductRecord, ApiError> {
        if let Some(record) = self.cache.product(id, self.max_age) {
            tracing::debug!(product_id = %id, "product cache hit");
            return Ok(record);
        }
        self.refetch_product(id).await
    }

    /// Bypass the cache. If a newer version was cached while the fetch was in
    /// flight, that version is returned instead of the fetched one.
    pub async fn refetch_product(&self, id: ProductId) -> Result<ProductRecord, ApiError> {
        let record = self.api.fetch_product(id).await?;
        if self.cache.put_product(record.clone()) {
            return Ok(record);
        }
        Ok(self.cache.product(id, None).unwrap_or(record))
    }

    pub async fn products(&self) -> Result<Vec<ProductRecord>, ApiError> {
        if let Some(records) = self.cache.products(self.max_age) {
            tracing::debug!(count = records.len(), "product list cache hit");
            return Ok(records);
        }
        let records = self.api.list_products().await?;
        self.cache.put_list(records.clone());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roastah_core::{AggregateId, SellerId};
    use roastah_products::{ProductDetails, ProductState, ProductTags, RoastLevel};

    fn record(state: ProductState, version: u64) -> ProductRecord {
        ProductRecord {
            id: ProductId::new(AggregateId::new()),
            seller_id: SellerId::new(),
            details: ProductDetails {
                name: "Kenya Nyeri".to_string(),
                description: String::new(),
                price_cents: 2_000,
                weight_grams: 250,
                roast_level: RoastLevel::Light,
                origin: None,
            },
            state,
            tags: ProductTags::default(),
            version,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn serves_fresh_entries_only() {
        let cache = QueryCache::new();
        let rec = record(ProductState::Draft, 1);
        cache.put_product(rec.clone());

        assert_eq!(cache.product(rec.id, None), Some(rec.clone()));
        assert_eq!(cache.product(rec.id, Some(Duration::from_secs(60))), Some(rec.clone()));

        cache.invalidate_product(rec.id);
        assert_eq!(cache.product(rec.id, None), None);
    }

    /// Pretend `id` was cached `age` ago.
    fn backdate(cache: &QueryCache, id: ProductId, age: chrono::Duration) {
        let mut state = cache.inner.write().unwrap();
        let entry = state.products.get_mut(&id).unwrap();
        entry.cached_at = entry.cached_at - age;
    }

    #[test]
    fn expired_entries_are_not_served() {
        let cache = QueryCache::new();
        let rec = record(ProductState::Draft, 1);
        cache.put_product(rec.clone());
        backdate(&cache, rec.id, chrono::Duration::seconds(30));

        assert_eq!(cache.product(rec.id, Some(Duration::from_secs(10))), None);
        assert_eq!(cache.product(rec.id, Some(Duration::from_secs(60))), Some(rec.clone()));
        // no max age means the entry never expires
        assert_eq!(cache.product(rec.id, None), Some(rec));
    }

    #[test]
    fn older_fetch_does_not_overwrite_newer_entry() {
        let cache = QueryCache::new();
        let newer = record(ProductState::PendingReview, 2);
        let mut older = newer.clone();
        older.version = 1;
        older.state = ProductState::Draft;

        assert!(cache.put_product(newer.clone()));
        assert!(!cache.put_product(older));
        assert_eq!(cache.product(newer.id, None).unwrap().state, ProductState::PendingReview);
    }

    #[test]
    fn confirmed_write_updates_detail_and_list() {
        let cache = QueryCache::new();
        let rec = record(ProductState::Draft, 1);
        cache.put_product(rec.clone());
        cache.put_list(vec![rec.clone()]);

        let mut confirmed = rec.clone();
        confirmed.state = ProductState::PendingReview;
        confirmed.version = 2;

        assert_eq!(cache.apply_confirmed(confirmed.clone()), CacheWrite::Applied);
        assert_eq!(cache.product(rec.id, None), Some(confirmed));
        // list row is patched but the query is marked for refetch
        assert_eq!(cache.products(None), None);
    }

    #[test]
    fn out_of_order_response_is_dropped() {
        let cache = QueryCache::new();
        let rec = record(ProductState::Draft, 1);

        let mut later = rec.clone();
        later.version = 3;
        later.state = ProductState::PendingReview;
        let mut earlier = rec.clone();
        earlier.version = 2;
        earlier.tags.is_preorder = true;

        assert_eq!(cache.apply_confirmed(later.clone()), CacheWrite::Applied);
        assert_eq!(cache.apply_confirmed(earlier), CacheWrite::Stale);
        assert_eq!(cache.product(rec.id, None), Some(later));
    }

    #[test]
    fn unversioned_responses_apply_last_write_wins() {
        let cache = QueryCache::new();
        let first = record(ProductState::Draft, 0);
        let mut second = first.clone();
        second.state = ProductState::PendingReview;

        assert_eq!(cache.apply_confirmed(first.clone()), CacheWrite::Applied);
        assert_eq!(cache.apply_confirmed(second.clone()), CacheWrite::Applied);
        assert_eq!(cache.product(first.id, None), Some(second));
    }

    #[test]
    fn remove_drops_list_row() {
        let cache = QueryCache::new();
        let a = record(ProductState::Draft, 1);
        let b = record(ProductState::Draft, 1);
        cache.put_product(a.clone());
        cache.put_list(vec![a.clone(), b.clone()]);

        cache.remove_product(a.id);
        assert_eq!(cache.product(a.id, None), None);
        assert_eq!(cache.products(None), None);
    }

    #[tokio::test]
    async fn queries_fetch_on_miss_then_hit() {
        use crate::memory::InMemoryProductApi;

        let api = Arc::new(InMemoryProductApi::new(SellerId::new()));
        let seeded = api
            .create_product(record(ProductState::Draft, 0).details)
            .unwrap();
        let cache = Arc::new(QueryCache::new());
        let queries = ProductQueries::new(api.clone(), cache.clone(), None);

        let fetched = queries.product(seeded.id).await.unwrap();
        assert_eq!(fetched, seeded);

        api.expire_session();
        // served from cache without touching the authority
        assert_eq!(queries.product(seeded.id).await.unwrap(), seeded);
        assert_eq!(queries.refetch_product(seeded.id).await.unwrap_err(), ApiError::Unauthorized);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        use crate::memory::InMemoryProductApi;
        use roastah_products::ProductTag;

        let api = Arc::new(InMemoryProductApi::new(SellerId::new()));
        let seeded = api
            .create_product(record(ProductState::Draft, 0).details)
            .unwrap();
        let cache = Arc::new(QueryCache::new());
        let queries = ProductQueries::new(api.clone(), cache.clone(), Some(Duration::from_secs(10)));
        assert_eq!(queries.product(seeded.id).await.unwrap(), seeded);

        // another client changes the product behind the cache's back
        api.set_tag(seeded.id, ProductTag::Preorder, true).await.unwrap();
        assert!(!queries.product(seeded.id).await.unwrap().tags.is_preorder);

        backdate(&cache, seeded.id, chrono::Duration::seconds(11));
        let refetched = queries.product(seeded.id).await.unwrap();
        assert!(refetched.tags.is_preorder);
        assert_eq!(refetched.version, seeded.version + 1);
        assert_eq!(cache.product(seeded.id, None), Some(refetched));
    }

    #[tokio::test]
    async fn refetch_returns_newer_cached_version() {
        use crate::memory::InMemoryProductApi;
        use roastah_products::ProductTag;

        let api = Arc::new(
            InMemoryProductApi::new(SellerId::new()).with_latency(Duration::from_millis(40)),
        );
        let seeded = api
            .create_product(record(ProductState::Draft, 0).details)
            .unwrap();
        let cache = Arc::new(QueryCache::new());
        let queries = ProductQueries::new(api.clone(), cache.clone(), None);

        let (refetched, ()) = tokio::join!(queries.refetch_product(seeded.id), async {
            // a mutation confirmed while the fetch is still in flight
            let mut confirmed = seeded.clone();
            confirmed.version += 1;
            confirmed.tags.is_private = true;
            assert_eq!(cache.apply_confirmed(confirmed), CacheWrite::Applied);
        });
        let refetched = refetched.unwrap();
        assert!(refetched.tags.is_private);
        assert_eq!(refetched.version, seeded.version + 1);
    }
}
