//! Wire shape of a fetched product and the view-model derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roastah_core::SellerId;

use crate::details::ProductDetails;
use crate::product::ProductId;
use crate::state::ProductState;
use crate::tags::{ProductTag, ProductTags};

/// Product as returned by "fetch product by id".
///
/// Details and tag flags are flattened, so the JSON reads
/// `{ "id", "sellerId", "name", ..., "state", "isPreorder", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: ProductId,
    pub seller_id: SellerId,
    #[serde(flatten)]
    pub details: ProductDetails,
    pub state: ProductState,
    #[serde(flatten)]
    pub tags: ProductTags,
    #[serde(default)]
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn active_tags(&self) -> Vec<ProductTag> {
        self.tags.active()
    }

    pub fn badges(&self) -> Vec<TagBadge> {
        self.active_tags().into_iter().map(TagBadge::from).collect()
    }

    pub fn lifecycle(&self) -> LifecycleView {
        LifecycleView::of(self.state)
    }
}

/// Display data for one active tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagBadge {
    pub tag: ProductTag,
    pub label: &'static str,
    pub color: &'static str,
}

impl From<ProductTag> for TagBadge {
    fn from(tag: ProductTag) -> Self {
        Self {
            tag,
            label: tag.label(),
            color: tag.color(),
        }
    }
}

/// Every affordance derived from a single [`ProductState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleView {
    pub state: ProductState,
    pub label: &'static str,
    pub color: &'static str,
    pub transitions: Vec<ProductState>,
    pub can_edit: bool,
    pub can_publish: bool,
    pub can_archive: bool,
    pub can_delete: bool,
}

impl LifecycleView {
    pub fn of(state: ProductState) -> Self {
        Self {
            state,
            label: state.label(),
            color: state.color(),
            transitions: state.available_transitions().to_vec(),
            can_edit: state.can_edit(),
            can_publish: state.can_publish(),
            can_archive: state.can_archive(),
            can_delete: state.can_delete(),
        }
    }
}
