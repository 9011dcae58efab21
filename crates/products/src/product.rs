use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roastah_core::{Aggregate, AggregateId, AggregateRoot, DomainError, SellerId};
use roastah_events::Event;

use crate::details::{ProductDetails, ProductDetailsPatch};
use crate::record::ProductRecord;
use crate::state::ProductState;
use crate::tags::{ProductTag, ProductTags};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for ProductId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<AggregateId>().map(Self)
    }
}

/// Aggregate root: Product.
///
/// This is the authority's view of a listing: it owns the lifecycle state and
/// the tag flags and enforces the same table the editor reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    seller_id: Option<SellerId>,
    details: Option<ProductDetails>,
    state: ProductState,
    tags: ProductTags,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            seller_id: None,
            details: None,
            state: ProductState::INITIAL,
            tags: ProductTags::default(),
            updated_at: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn details(&self) -> Option<&ProductDetails> {
        self.details.as_ref()
    }

    pub fn state(&self) -> ProductState {
        self.state
    }

    pub fn tags(&self) -> ProductTags {
        self.tags
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Live products only; `None` before creation and after deletion.
    pub fn to_record(&self) -> Option<ProductRecord> {
        if !self.created || self.deleted {
            return None;
        }
        Some(ProductRecord {
            id: self.id,
            seller_id: self.seller_id?,
            details: self.details.clone()?,
            state: self.state,
            tags: self.tags,
            version: self.version,
            updated_at: self.updated_at?,
        })
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProductDetails (field-level PATCH).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductDetails {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub patch: ProductDetailsPatch,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionProduct {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub to: ProductState,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetProductTag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetProductTag {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub tag: ProductTag,
    pub value: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProductDetails(UpdateProductDetails),
    TransitionProduct(TransitionProduct),
    SetProductTag(SetProductTag),
    DeleteProduct(DeleteProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDetailsUpdated (carries the full resulting details).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetailsUpdated {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductStateChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStateChanged {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub from: ProductState,
    pub to: ProductState,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductTagSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTagSet {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub tag: ProductTag,
    pub value: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductDetailsUpdated(ProductDetailsUpdated),
    ProductStateChanged(ProductStateChanged),
    ProductTagSet(ProductTagSet),
    ProductDeleted(ProductDeleted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductDetailsUpdated(_) => "catalog.product.details_updated",
            ProductEvent::ProductStateChanged(_) => "catalog.product.state_changed",
            ProductEvent::ProductTagSet(_) => "catalog.product.tag_set",
            ProductEvent::ProductDeleted(_) => "catalog.product.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductDetailsUpdated(e) => e.occurred_at,
            ProductEvent::ProductStateChanged(e) => e.occurred_at,
            ProductEvent::ProductTagSet(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.seller_id = Some(e.seller_id);
                self.details = Some(e.details.clone());
                self.state = ProductState::INITIAL;
                self.tags = ProductTags::default();
                self.created = true;
            }
            ProductEvent::ProductDetailsUpdated(e) => {
                self.details = Some(e.details.clone());
            }
            ProductEvent::ProductStateChanged(e) => {
                self.state = e.to;
            }
            ProductEvent::ProductTagSet(e) => {
                self.tags.set(e.tag, e.value);
            }
            ProductEvent::ProductDeleted(_) => {
                self.deleted = true;
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProductDetails(cmd) => self.handle_update(cmd),
            ProductCommand::TransitionProduct(cmd) => self.handle_transition(cmd),
            ProductCommand::SetProductTag(cmd) => self.handle_set_tag(cmd),
            ProductCommand::DeleteProduct(cmd) => self.handle_delete(cmd),
        }
    }
}

fn validation_error(details: &ProductDetails) -> Result<(), DomainError> {
    details.validate().map_err(|errors| {
        DomainError::validation(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    })
}

impl Product {
    /// Existing, live, owned by `seller_id`, addressed by `product_id`.
    fn ensure_live(&self, seller_id: SellerId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found());
        }
        if self.seller_id != Some(seller_id) {
            return Err(DomainError::Unauthorized);
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        let details = cmd.details.clone().normalized();
        validation_error(&details)?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            seller_id: cmd.seller_id,
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProductDetails) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.seller_id, cmd.product_id)?;

        if !self.state.can_edit() {
            return Err(DomainError::invariant(format!(
                "{} products cannot be edited",
                self.state
            )));
        }
        if cmd.patch.is_empty() {
            return Err(DomainError::validation("update contains no fields"));
        }

        let current = self
            .details
            .as_ref()
            .ok_or_else(|| DomainError::invariant("created product has no details"))?;
        let next = cmd.patch.apply_to(current);
        validation_error(&next)?;

        Ok(vec![ProductEvent::ProductDetailsUpdated(ProductDetailsUpdated {
            seller_id: cmd.seller_id,
            product_id: cmd.product_id,
            details: next,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(&self, cmd: &TransitionProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.seller_id, cmd.product_id)?;

        if cmd.to == self.state {
            return Err(DomainError::conflict(format!("product is already {}", self.state)));
        }
        if !self.state.can_transition_to(cmd.to) {
            return Err(DomainError::invariant(format!(
                "cannot move a {} product to {}",
                self.state, cmd.to
            )));
        }

        Ok(vec![ProductEvent::ProductStateChanged(ProductStateChanged {
            seller_id: cmd.seller_id,
            product_id: cmd.product_id,
            from: self.state,
            to: cmd.to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_tag(&self, cmd: &SetProductTag) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.seller_id, cmd.product_id)?;

        if !self.state.can_edit() {
            return Err(DomainError::invariant(format!(
                "tags of {} products cannot be changed",
                self.state
            )));
        }
        if self.tags.get(cmd.tag) == cmd.value {
            return Err(DomainError::conflict(format!(
                "{} is already {}",
                cmd.tag, cmd.value
            )));
        }

        Ok(vec![ProductEvent::ProductTagSet(ProductTagSet {
            seller_id: cmd.seller_id,
            product_id: cmd.product_id,
            tag: cmd.tag,
            value: cmd.value,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live(cmd.seller_id, cmd.product_id)?;

        if !self.state.can_delete() {
            return Err(DomainError::invariant(format!(
                "{} products cannot be deleted",
                self.state
            )));
        }

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            seller_id: cmd.seller_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
