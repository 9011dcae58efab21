//! In-process catalog authority.
//!
//! Runs the [`Product`] aggregate directly and records every event in a
//! per-product stream. Used by `roastah --memory` and by tests; it answers
//! with the same errors the HTTP API would.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use roastah_core::{Aggregate, AggregateRoot, SellerId};
use roastah_events::{EventEnvelope, StreamRef};
use roastah_products::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductDetails, ProductDetailsPatch,
    ProductEvent, ProductId, ProductRecord, ProductState, ProductTag, SetProductTag,
    TransitionProduct, UpdateProductDetails,
};

use crate::api::{ApiError, ProductApi};

const AGGREGATE_TYPE: &str = "catalog.product";

#[derive(Debug)]
struct Stream {
    product: Product,
    events: Vec<EventEnvelope<ProductEvent>>,
}

/// Lifecycle authority held in memory, acting as a single signed-in seller.
#[derive(Debug)]
pub struct InMemoryProductApi {
    seller_id: SellerId,
    streams: RwLock<HashMap<ProductId, Stream>>,
    session_valid: AtomicBool,
    injected: Mutex<VecDeque<ApiError>>,
    latency: Option<Duration>,
}

impl InMemoryProductApi {
    pub fn new(seller_id: SellerId) -> Self {
        Self {
            seller_id,
            streams: RwLock::new(HashMap::new()),
            session_valid: AtomicBool::new(true),
            injected: Mutex::new(VecDeque::new()),
            latency: None,
        }
    }

    /// Delay every request by `latency` (to observe in-flight behaviour).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn seller_id(&self) -> SellerId {
        self.seller_id
    }

    /// Create a draft product owned by the acting seller.
    pub fn create_product(&self, details: ProductDetails) -> Result<ProductRecord, ApiError> {
        let product_id = ProductId::generate();
        let cmd = ProductCommand::CreateProduct(CreateProduct {
            seller_id: self.seller_id,
            product_id,
            details,
            occurred_at: Utc::now(),
        });

        let mut streams = self.write_streams()?;
        let mut stream = Stream {
            product: Product::empty(product_id),
            events: Vec::new(),
        };
        let record = Self::commit(&mut stream, &cmd)?;
        streams.insert(product_id, stream);
        tracing::info!(product_id = %product_id, "product created");
        Ok(record)
    }

    /// Create a product and walk it along the shortest legal path to `state`.
    pub fn seed_product(
        &self,
        details: ProductDetails,
        state: ProductState,
    ) -> Result<ProductRecord, ApiError> {
        let mut record = self.create_product(details)?;
        let path = path_from_draft(state).ok_or_else(|| {
            ApiError::Rejected(format!("{state} is unreachable from draft"))
        })?;
        for to in path {
            record = self.execute(record.id, |seller_id, product_id| {
                ProductCommand::TransitionProduct(TransitionProduct {
                    seller_id,
                    product_id,
                    to,
                    occurred_at: Utc::now(),
                })
            })?;
        }
        Ok(record)
    }

    /// Recorded events of a product, oldest first (kept after deletion).
    pub fn history(&self, id: ProductId) -> Vec<EventEnvelope<ProductEvent>> {
        self.streams
            .read()
            .ok()
            .and_then(|streams| streams.get(&id).map(|s| s.events.clone()))
            .unwrap_or_default()
    }

    /// Current authoritative record, bypassing session checks.
    pub fn peek(&self, id: ProductId) -> Option<ProductRecord> {
        self.streams
            .read()
            .ok()?
            .get(&id)
            .and_then(|s| s.product.to_record())
    }

    /// Every subsequent request answers `Unauthorized` until restored.
    pub fn expire_session(&self) {
        self.session_valid.store(false, Ordering::SeqCst);
    }

    pub fn restore_session(&self) {
        self.session_valid.store(true, Ordering::SeqCst);
    }

    /// Answer the next request with `err` instead of handling it.
    pub fn fail_next(&self, err: ApiError) {
        if let Ok(mut queue) = self.injected.lock() {
            queue.push_back(err);
        }
    }

    fn read_streams(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ProductId, Stream>>, ApiError> {
        self.streams.read().map_err(|_| ApiError::Server {
            status: 500,
            message: "lock poisoned".to_string(),
        })
    }

    fn write_streams(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ProductId, Stream>>, ApiError> {
        self.streams.write().map_err(|_| ApiError::Server {
            status: 500,
            message: "lock poisoned".to_string(),
        })
    }

    /// Session, latency and injected-failure handling shared by every request.
    async fn admit(&self) -> Result<(), ApiError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.session_valid.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized);
        }
        let injected = self.injected.lock().ok().and_then(|mut q| q.pop_front());
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn append(stream: &mut Stream, cmd: &ProductCommand) -> Result<(), ApiError> {
        let first = stream.product.version() + 1;
        let events = stream.product.execute(cmd)?;
        let origin = StreamRef {
            seller_id: stream.product.seller_id().unwrap_or_default(),
            aggregate_id: stream.product.id_typed().0,
            aggregate_type: AGGREGATE_TYPE.to_string(),
        };
        for (offset, event) in (0u64..).zip(events) {
            stream
                .events
                .push(EventEnvelope::record(origin.clone(), first + offset, event));
        }
        Ok(())
    }

    fn commit(stream: &mut Stream, cmd: &ProductCommand) -> Result<ProductRecord, ApiError> {
        Self::append(stream, cmd)?;
        stream.product.to_record().ok_or(ApiError::NotFound)
    }

    fn execute<F>(&self, id: ProductId, make: F) -> Result<ProductRecord, ApiError>
    where
        F: FnOnce(SellerId, ProductId) -> ProductCommand,
    {
        let mut streams = self.write_streams()?;
        let stream = streams.get_mut(&id).ok_or(ApiError::NotFound)?;
        let cmd = make(self.seller_id, id);
        Self::commit(stream, &cmd)
    }
}

/// Shortest path of transitions from `draft` to `target` (empty for draft).
fn path_from_draft(target: ProductState) -> Option<Vec<ProductState>> {
    let mut queue = VecDeque::from([(ProductState::INITIAL, Vec::new())]);
    let mut seen = vec![ProductState::INITIAL];
    while let Some((state, path)) = queue.pop_front() {
        if state == target {
            return Some(path);
        }
        for next in state.available_transitions() {
            if !seen.contains(next) {
                seen.push(*next);
                let mut extended = path.clone();
                extended.push(*next);
                queue.push_back((*next, extended));
            }
        }
    }
    None
}

#[async_trait]
impl ProductApi for InMemoryProductApi {
    async fn fetch_product(&self, id: ProductId) -> Result<ProductRecord, ApiError> {
        self.admit().await?;
        let streams = self.read_streams()?;
        let stream = streams.get(&id).ok_or(ApiError::NotFound)?;
        if stream.product.seller_id() != Some(self.seller_id) {
            return Err(ApiError::Forbidden("product belongs to another seller".to_string()));
        }
        stream.product.to_record().ok_or(ApiError::NotFound)
    }

    async fn list_products(&self) -> Result<Vec<ProductRecord>, ApiError> {
        self.admit().await?;
        let streams = self.read_streams()?;
        let mut items: Vec<ProductRecord> = streams
            .values()
            .filter_map(|s| s.product.to_record())
            .filter(|r| r.seller_id == self.seller_id)
            .collect();
        items.sort_by_key(|r| *r.id.0.as_uuid());
        Ok(items)
    }

    async fn transition_state(
        &self,
        id: ProductId,
        to: ProductState,
    ) -> Result<ProductRecord, ApiError> {
        self.admit().await?;
        let record = self.execute(id, |seller_id, product_id| {
            ProductCommand::TransitionProduct(TransitionProduct {
                seller_id,
                product_id,
                to,
                occurred_at: Utc::now(),
            })
        })?;
        tracing::info!(product_id = %id, state = %to, "product state changed");
        Ok(record)
    }

    async fn set_tag(
        &self,
        id: ProductId,
        tag: ProductTag,
        value: bool,
    ) -> Result<ProductRecord, ApiError> {
        self.admit().await?;
        self.execute(id, |seller_id, product_id| {
            ProductCommand::SetProductTag(SetProductTag {
                seller_id,
                product_id,
                tag,
                value,
                occurred_at: Utc::now(),
            })
        })
    }

    async fn update_fields(
        &self,
        id: ProductId,
        patch: ProductDetailsPatch,
    ) -> Result<ProductRecord, ApiError> {
        self.admit().await?;
        self.execute(id, |seller_id, product_id| {
            ProductCommand::UpdateProductDetails(UpdateProductDetails {
                seller_id,
                product_id,
                patch,
                occurred_at: Utc::now(),
            })
        })
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), ApiError> {
        self.admit().await?;
        let mut streams = self.write_streams()?;
        let stream = streams.get_mut(&id).ok_or(ApiError::NotFound)?;
        let cmd = ProductCommand::DeleteProduct(DeleteProduct {
            seller_id: self.seller_id,
            product_id: id,
            occurred_at: Utc::now(),
        });
        Self::append(stream, &cmd)?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roastah_events::Event;
    use roastah_products::RoastLevel;

    fn details() -> ProductDetails {
        ProductDetails {
            name: "Colombia Huila".to_string(),
            description: "Caramel, red apple".to_string(),
            price_cents: 1_650,
            weight_grams: 340,
            roast_level: RoastLevel::Medium,
            origin: None,
        }
    }

    #[test]
    fn shortest_paths_from_draft() {
        assert_eq!(path_from_draft(ProductState::Draft), Some(vec![]));
        assert_eq!(
            path_from_draft(ProductState::Archived),
            Some(vec![
                ProductState::PendingReview,
                ProductState::Published,
                ProductState::Archived
            ])
        );
        assert_eq!(
            path_from_draft(ProductState::Rejected),
            Some(vec![ProductState::PendingReview, ProductState::Rejected])
        );
    }

    #[tokio::test]
    async fn seeded_product_history_is_sequenced() {
        let api = InMemoryProductApi::new(SellerId::new());
        let record = api.seed_product(details(), ProductState::Published).unwrap();
        assert_eq!(record.state, ProductState::Published);

        let history = api.history(record.id);
        let sequence: Vec<u64> = history.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
        assert_eq!(history[0].payload().event_type(), "catalog.product.created");
        assert_eq!(history[2].event_type(), "catalog.product.state_changed");
        assert!(history.iter().all(|e| e.seller_id() == api.seller_id()));
    }

    #[tokio::test]
    async fn domain_rejections_surface_as_api_errors() {
        let api = InMemoryProductApi::new(SellerId::new());
        let record = api.seed_product(details(), ProductState::Published).unwrap();

        let err = api
            .transition_state(record.id, ProductState::Draft)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));

        let err = api.delete_product(record.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
        assert_eq!(api.peek(record.id).unwrap().state, ProductState::Published);
    }

    #[tokio::test]
    async fn expired_session_blocks_every_call() {
        let api = InMemoryProductApi::new(SellerId::new());
        let record = api.create_product(details()).unwrap();

        api.expire_session();
        assert_eq!(api.fetch_product(record.id).await.unwrap_err(), ApiError::Unauthorized);
        assert_eq!(api.list_products().await.unwrap_err(), ApiError::Unauthorized);

        api.restore_session();
        assert!(api.fetch_product(record.id).await.is_ok());
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let api = InMemoryProductApi::new(SellerId::new());
        let record = api.create_product(details()).unwrap();

        api.fail_next(ApiError::Conflict("raced".to_string()));
        assert!(matches!(
            api.set_tag(record.id, ProductTag::Preorder, true).await,
            Err(ApiError::Conflict(_))
        ));
        let updated = api.set_tag(record.id, ProductTag::Preorder, true).await.unwrap();
        assert!(updated.tags.is_preorder);
    }

    #[tokio::test]
    async fn deleted_products_leave_the_list() {
        let api = InMemoryProductApi::new(SellerId::new());
        let keep = api.create_product(details()).unwrap();
        let gone = api.create_product(details()).unwrap();

        api.delete_product(gone.id).await.unwrap();

        let ids: Vec<ProductId> = api.list_products().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![keep.id]);
        assert_eq!(api.fetch_product(gone.id).await.unwrap_err(), ApiError::NotFound);
        assert_eq!(api.history(gone.id).len(), 2);
    }
}
