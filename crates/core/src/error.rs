//! Domain error model.

use thiserror::Error;

/// Domain-level error raised by catalog rules.
///
/// Only deterministic business failures live here. Transport and storage
/// failures are modelled by the client crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (e.g. an empty product name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A lifecycle rule was violated (e.g. `published -> draft`).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The product does not exist (or has been deleted).
    #[error("not found")]
    NotFound,

    /// The command conflicts with current state (duplicate create, stale
    /// version, tag already at the requested value).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting seller does not own the product.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
