//! Product lifecycle states and the affordances derived from them.
//!
//! Everything here is a total function over [`ProductState`]. The adjacency
//! table and the action predicates are catalog policy; they are spelled out
//! per state rather than derived from the enum order.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use roastah_core::DomainError;

/// Lifecycle stage of a catalog listing.
///
/// Exactly one state holds per product; the authority owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductState {
    Draft,
    PendingReview,
    Published,
    Archived,
    Rejected,
}

impl ProductState {
    /// Every state, in lifecycle order.
    pub const ALL: [ProductState; 5] = [
        ProductState::Draft,
        ProductState::PendingReview,
        ProductState::Published,
        ProductState::Archived,
        ProductState::Rejected,
    ];

    /// State a newly created product starts in.
    pub const INITIAL: ProductState = ProductState::Draft;

    /// Wire name (`pending_review`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ProductState::Draft => "draft",
            ProductState::PendingReview => "pending_review",
            ProductState::Published => "published",
            ProductState::Archived => "archived",
            ProductState::Rejected => "rejected",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            ProductState::Draft => "Draft",
            ProductState::PendingReview => "Pending Review",
            ProductState::Published => "Published",
            ProductState::Archived => "Archived",
            ProductState::Rejected => "Rejected",
        }
    }

    /// Display colour token. Cosmetic only.
    pub fn color(self) -> &'static str {
        match self {
            ProductState::Draft => "gray",
            ProductState::PendingReview => "amber",
            ProductState::Published => "green",
            ProductState::Archived => "slate",
            ProductState::Rejected => "red",
        }
    }

    /// States reachable in one step from `self`.
    ///
    /// A withdrawn review goes back to `draft`; a rejected product must be
    /// reworked as a draft before it can be resubmitted.
    pub fn available_transitions(self) -> &'static [ProductState] {
        match self {
            ProductState::Draft => &[ProductState::PendingReview],
            ProductState::PendingReview => &[
                ProductState::Published,
                ProductState::Rejected,
                ProductState::Draft,
            ],
            ProductState::Published => &[ProductState::Archived],
            ProductState::Archived => &[],
            ProductState::Rejected => &[ProductState::Draft],
        }
    }

    pub fn can_transition_to(self, next: ProductState) -> bool {
        self.available_transitions().contains(&next)
    }

    /// No outbound transitions.
    pub fn is_terminal(self) -> bool {
        self.available_transitions().is_empty()
    }

    /// Whether product fields (and tags) may be mutated.
    pub fn can_edit(self) -> bool {
        match self {
            ProductState::Draft | ProductState::Rejected => true,
            ProductState::PendingReview | ProductState::Published | ProductState::Archived => false,
        }
    }

    pub fn can_publish(self) -> bool {
        match self {
            ProductState::PendingReview => true,
            ProductState::Draft
            | ProductState::Published
            | ProductState::Archived
            | ProductState::Rejected => false,
        }
    }

    pub fn can_archive(self) -> bool {
        match self {
            ProductState::Published => true,
            ProductState::Draft
            | ProductState::PendingReview
            | ProductState::Archived
            | ProductState::Rejected => false,
        }
    }

    /// Hard delete is limited to states that were never customer-facing.
    pub fn can_delete(self) -> bool {
        match self {
            ProductState::Draft | ProductState::Rejected => true,
            ProductState::PendingReview | ProductState::Published | ProductState::Archived => false,
        }
    }
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ProductState::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown product state '{s}' (expected one of: draft, pending_review, published, archived, rejected)"
                ))
            })
    }
}
