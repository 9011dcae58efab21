//! The seam between the edit surface and the catalog authority.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use roastah_core::DomainError;
use roastah_products::{ProductDetailsPatch, ProductId, ProductRecord, ProductState, ProductTag};

/// Failure of a request to the catalog authority.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    /// Session missing or expired; the user must sign in again.
    #[error("session expired or missing")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("product not found")]
    NotFound,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The authority refused the change on policy grounds.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// HTTP status the authority answers with for this error.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Unauthorized => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound => 404,
            ApiError::Validation(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::Rejected(_) => 422,
            ApiError::Server { status, .. } => *status,
            ApiError::Network(_) | ApiError::Parse(_) => 502,
        }
    }

    /// Machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "network_error",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound => "not_found",
            ApiError::Validation(_) => "validation_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::Rejected(_) => "invariant_violation",
            ApiError::Server { .. } => "server_error",
            ApiError::Parse(_) => "parse_error",
        }
    }

    /// Rebuild an error from an HTTP status and its JSON body.
    pub fn from_status(status: u16, body: Option<ErrorBody>) -> Self {
        let message = body.map(|b| b.message).unwrap_or_default();
        match status {
            400 => ApiError::Validation(message),
            401 => ApiError::Unauthorized,
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound,
            409 => ApiError::Conflict(message),
            422 => ApiError::Rejected(message),
            _ => ApiError::Server { status, message },
        }
    }

    /// Human-readable detail without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            ApiError::Network(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Validation(msg)
            | ApiError::Conflict(msg)
            | ApiError::Rejected(msg)
            | ApiError::Parse(msg) => msg.clone(),
            ApiError::Server { message, .. } => message.clone(),
            ApiError::Unauthorized | ApiError::NotFound => self.to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::Validation(msg),
            DomainError::InvariantViolation(msg) => ApiError::Rejected(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::NotFound => ApiError::NotFound,
            DomainError::Unauthorized => {
                ApiError::Forbidden("product belongs to another seller".to_string())
            }
        }
    }
}

/// JSON error body: `{ "error": code, "message": text }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Body of a state-transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub state: ProductState,
}

/// Body of the product-list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductList {
    pub items: Vec<ProductRecord>,
}

/// Body of a tag toggle: exactly one `{ "<tagName>": bool }` pair.
pub fn tag_request(tag: ProductTag, value: bool) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    body.insert(tag.field_name().to_string(), serde_json::Value::Bool(value));
    serde_json::Value::Object(body)
}

/// Parse a tag toggle body back into its single `(tag, value)` pair.
pub fn parse_tag_request(body: &serde_json::Value) -> Result<(ProductTag, bool), ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::Validation("tag body must be an object".to_string()))?;
    let mut pairs = object.iter();
    match (pairs.next(), pairs.next()) {
        (Some((name, value)), None) => {
            let tag = name
                .parse::<ProductTag>()
                .map_err(|e| ApiError::Validation(e.to_string()))?;
            let value = value
                .as_bool()
                .ok_or_else(|| ApiError::Validation(format!("{name} must be a boolean")))?;
            Ok((tag, value))
        }
        _ => Err(ApiError::Validation(
            "tag body must contain exactly one tag".to_string(),
        )),
    }
}

/// Operations the catalog authority exposes to the edit surface.
///
/// Every mutation returns the authoritative record after the change, so the
/// caller can update its cache without guessing.
#[async_trait]
pub trait ProductApi: Send + Sync {
    async fn fetch_product(&self, id: ProductId) -> Result<ProductRecord, ApiError>;

    /// Catalogue of the acting seller.
    async fn list_products(&self) -> Result<Vec<ProductRecord>, ApiError>;

    async fn transition_state(
        &self,
        id: ProductId,
        to: ProductState,
    ) -> Result<ProductRecord, ApiError>;

    async fn set_tag(
        &self,
        id: ProductId,
        tag: ProductTag,
        value: bool,
    ) -> Result<ProductRecord, ApiError>;

    async fn update_fields(
        &self,
        id: ProductId,
        patch: ProductDetailsPatch,
    ) -> Result<ProductRecord, ApiError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), ApiError>;
}
