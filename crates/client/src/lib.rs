//! `roastah-client`
//!
//! **Responsibility:** seller-side edit surface for catalog listings.
//!
//! This crate provides:
//! - The [`ProductApi`] seam to the catalog authority (HTTP and in-memory)
//! - A shared query cache written only on confirmed mutations
//! - A headless product editor gated by the lifecycle view-model
//! - Persisted UI preferences
//!
//! The catalog API remains the authority; nothing here decides a lifecycle
//! change on its own.

pub mod api;
pub mod cache;
pub mod config;
pub mod editor;
pub mod http;
pub mod memory;
pub mod prefs;

pub use api::{ApiError, ErrorBody, ProductApi};
pub use cache::{CacheWrite, ProductQueries, QueryCache};
pub use config::{ClientConfig, ConfigError};
pub use editor::{
    Control, DeleteConfirmation, EditError, EditView, Notice, NoticeLevel, ProductEditor,
    TagToggle,
};
pub use http::HttpProductApi;
pub use memory::InMemoryProductApi;
pub use prefs::{DashboardLayout, PreferenceError, PreferenceStore, ViewMode};
