//! Catalog domain for Roastah listings.
//!
//! Pure, deterministic logic only (no IO, no HTTP, no storage):
//! - [`state`]: lifecycle states, the transition table and action gates
//! - [`tags`]: the independent boolean flags shown as badges
//! - [`details`]: editable fields and their validation
//! - [`record`]: the fetched product shape and its derived view-model
//! - [`product`]: the event-sourced aggregate enforcing the same rules

pub mod details;
pub mod product;
pub mod record;
pub mod state;
pub mod tags;

pub use details::{FieldError, ProductDetails, ProductDetailsPatch, RoastLevel};
pub use product::{
    CreateProduct, DeleteProduct, Product, ProductCommand, ProductCreated, ProductDeleted,
    ProductDetailsUpdated, ProductEvent, ProductId, ProductStateChanged, ProductTagSet,
    SetProductTag, TransitionProduct, UpdateProductDetails,
};
pub use record::{LifecycleView, ProductRecord, TagBadge};
pub use state::ProductState;
pub use tags::{ProductTag, ProductTags};
